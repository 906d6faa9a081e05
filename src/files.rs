//! File access, include-path resolution and command-line defines
//!
//! Files are read whole into memory; no handle survives past a
//! statement boundary. Include names resolve sibling-first: next to the
//! including file, then along the configured search paths in insertion
//! order, then against the working directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::assembler::AsmError;

/// Read a whole source file into a string
pub fn read_source(path: &Path) -> Result<String, AsmError> {
    fs::read_to_string(path).map_err(|_| AsmError::ReadError {
        path: path.display().to_string(),
    })
}

/// Read a whole binary file
pub fn read_binary(path: &Path) -> Result<Vec<u8>, AsmError> {
    fs::read(path).map_err(|_| AsmError::ReadError {
        path: path.display().to_string(),
    })
}

/// The include search list
pub struct SourceResolver {
    paths: Vec<PathBuf>,
}

impl SourceResolver {
    pub fn new() -> SourceResolver {
        SourceResolver { paths: Vec::new() }
    }

    pub fn add_path(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Split an environment variable on `delimiter` and append each
    /// non-empty piece as a search path
    pub fn add_paths_from_env(&mut self, variable: &str, delimiter: char) {
        if let Ok(value) = env::var(variable) {
            for piece in value.split(delimiter) {
                if !piece.is_empty() {
                    self.paths.push(PathBuf::from(piece));
                }
            }
        }
    }

    /// Return the first existing candidate for `name`: sibling of the
    /// including file, each search path, then the working directory
    pub fn resolve(&self, name: &str, current_file: &Path) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(parent) = current_file.parent() {
            candidates.push(parent.join(name));
        }
        for path in &self.paths {
            candidates.push(path.join(name));
        }
        candidates.push(PathBuf::from(name));
        candidates.into_iter().find(|candidate| candidate.is_file())
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        SourceResolver::new()
    }
}

/// Parse a `NAME[=VALUE]` command-line define. The value reads as hex
/// with a `$` or `0x` prefix, binary with `%`, decimal otherwise; a
/// missing value defaults to 1.
pub fn parse_define(text: &str) -> Result<(String, i32), AsmError> {
    let pattern = Regex::new(r"^([A-Za-z_][A-Za-z_0-9]*)(?:=(.*))?$").unwrap();
    let bad = || AsmError::BadDefine {
        text: text.to_string(),
    };
    let captures = pattern.captures(text.trim()).ok_or_else(bad)?;
    let name = captures[1].to_string();
    let value = match captures.get(2) {
        None => 1,
        Some(value) => parse_define_value(value.as_str()).ok_or_else(bad)?,
    };
    Ok((name, value))
}

fn parse_define_value(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Some(digits) = text.strip_prefix('$') {
        return u32::from_str_radix(digits, 16).ok().map(|value| value as i32);
    }
    if let Some(digits) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        return u32::from_str_radix(digits, 16).ok().map(|value| value as i32);
    }
    if let Some(digits) = text.strip_prefix('%') {
        return u32::from_str_radix(digits, 2).ok().map(|value| value as i32);
    }
    text.parse::<i32>().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defines_parse_every_base() {
        assert_eq!(parse_define("DEBUG").unwrap(), ("DEBUG".to_string(), 1));
        assert_eq!(parse_define("N=42").unwrap(), ("N".to_string(), 42));
        assert_eq!(parse_define("A=$d020").unwrap(), ("A".to_string(), 0xd020));
        assert_eq!(parse_define("A=0x10").unwrap(), ("A".to_string(), 16));
        assert_eq!(parse_define("B=%101").unwrap(), ("B".to_string(), 5));
    }

    #[test]
    fn malformed_defines_are_rejected() {
        assert!(parse_define("1BAD").is_err());
        assert!(parse_define("X=notanumber").is_err());
        assert!(parse_define("").is_err());
    }

    #[test]
    fn resolver_prefers_the_siblings_of_the_including_file() {
        let dir = env::temp_dir().join("c64asm-resolver-test");
        fs::create_dir_all(&dir).unwrap();
        let included = dir.join("tables.asm");
        fs::write(&included, "!byte 0\n").unwrap();

        let resolver = SourceResolver::new();
        let current = dir.join("main.asm");
        let found = resolver.resolve("tables.asm", &current).unwrap();
        assert_eq!(found, included);
        assert!(resolver.resolve("missing.asm", &current).is_none());

        fs::remove_file(&included).ok();
        fs::remove_dir(&dir).ok();
    }

    #[test]
    fn resolver_falls_back_to_search_paths() {
        let dir = env::temp_dir().join("c64asm-resolver-paths");
        fs::create_dir_all(&dir).unwrap();
        let target = dir.join("lib.asm");
        fs::write(&target, "!byte 1\n").unwrap();

        let mut resolver = SourceResolver::new();
        resolver.add_path(dir.clone());
        let found = resolver
            .resolve("lib.asm", Path::new("elsewhere/main.asm"))
            .unwrap();
        assert_eq!(found, target);

        fs::remove_file(&target).ok();
        fs::remove_dir(&dir).ok();
    }
}
