//! Output artifact builders: PRG image, raw image, VICE symbol file and
//! the assembly listing
//!
//! All of these are pure views over the finished driver state. Symbol
//! output is explicitly sorted by `(value, name)`; hash-table iteration
//! order never reaches an artifact.

use crate::assembler::{AssembledLine, Assembler};

/// PRG image: two-byte little-endian load address, then the written
/// slice of memory. `None` when nothing was emitted.
pub fn prg_bytes(asm: &Assembler) -> Option<Vec<u8>> {
    let (load, image) = asm.image()?;
    let mut bytes = Vec::with_capacity(image.len() + 2);
    bytes.push((load & 0xff) as u8);
    bytes.push((load >> 8) as u8);
    bytes.extend_from_slice(image);
    Some(bytes)
}

/// Raw image without the load-address header
pub fn raw_bytes(asm: &Assembler) -> Option<Vec<u8>> {
    asm.image().map(|(_, image)| image.to_vec())
}

/// VICE-compatible symbol file: one `al C:XXXX .name` line per defined
/// symbol, sorted by `(value, name)` ascending
pub fn symbol_file(asm: &Assembler) -> String {
    let mut out = String::new();
    for symbol in asm.symbols().defined_sorted() {
        out.push_str(&format!(
            "al C:{:04X} .{}\n",
            symbol.value as u32, symbol.name
        ));
    }
    out
}

/// Plain-text listing: a header block, one record per assembled line,
/// and a trailing symbol table
pub fn listing(asm: &Assembler) -> String {
    let mut out = String::new();
    out.push_str("; c64asm assembly listing\n");
    out.push_str(&format!("; source: {}\n", asm.main_file()));
    out.push_str(&format!(
        "; {} lines, {} errors, {} warnings\n\n",
        asm.assembled_lines().len(),
        asm.error_count(),
        asm.warning_count()
    ));
    for record in asm.assembled_lines() {
        format_record(&mut out, record, asm.cycle_listing_enabled());
    }
    out.push_str("\n; symbols\n");
    for symbol in asm.symbols().defined_sorted() {
        out.push_str(&format!(
            "; {:04X} {}\n",
            symbol.value as u32, symbol.name
        ));
    }
    out
}

/// One listing record: address when bytes were emitted, up to four hex
/// bytes per row with continuation rows for longer emissions, the cycle
/// count when enabled, and the original source text
fn format_record(out: &mut String, record: &AssembledLine, show_cycles: bool) {
    let cycle_column = |cycles: u8, penalty: bool| {
        if !show_cycles || cycles == 0 {
            format!("{:6}", "")
        } else if penalty {
            format!("({}+)  ", cycles)
        } else {
            format!("({})   ", cycles)
        }
    };

    if record.byte_count == 0 {
        out.push_str(&format!(
            "      {:12}{}{}\n",
            "",
            cycle_column(0, false),
            record.source
        ));
        return;
    }

    let mut rows = record.bytes.chunks(4).enumerate().peekable();
    while let Some((group, chunk)) = rows.next() {
        let address = (record.pc as usize + group * 4) & 0xffff;
        let hex: Vec<String> = chunk.iter().map(|byte| format!("{:02X}", byte)).collect();
        let hex = hex.join(" ");
        if group == 0 {
            out.push_str(&format!(
                "{:04X}  {:12}{}{}\n",
                address,
                hex,
                cycle_column(record.cycles, record.page_penalty),
                record.source
            ));
        } else {
            out.push_str(&format!("{:04X}  {:12}\n", address, hex));
        }
        // records keep only the first bytes of very long emissions
        if rows.peek().is_none() && record.byte_count > record.bytes.len() {
            out.push_str(&format!(
                "      ... {} more bytes\n",
                record.byte_count - record.bytes.len()
            ));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn assembled(source: &str) -> Assembler {
        let mut assembler = Assembler::new();
        assert!(assembler.assemble_source(source, "listing.asm"));
        assembler
    }

    #[test]
    fn prg_carries_the_load_address_header() {
        let assembler = assembled("*=$0801\n!byte $0c, $08");
        assert_eq!(assembler.prg_bytes().unwrap(), vec![0x01, 0x08, 0x0c, 0x08]);
        assert_eq!(assembler.raw_bytes().unwrap(), vec![0x0c, 0x08]);
    }

    #[test]
    fn empty_assembly_produces_no_image() {
        let assembler = assembled("unused = 1");
        assert!(assembler.prg_bytes().is_none());
        assert!(assembler.raw_bytes().is_none());
    }

    #[test]
    fn prg_size_matches_the_written_span() {
        let assembler = assembled("*=$1000\n!byte 1\n*=$1004\n!byte 2");
        // span $1000..$1004 inclusive, plus the two-byte header
        assert_eq!(assembler.prg_bytes().unwrap().len(), 7);
    }

    #[test]
    fn symbol_file_is_sorted_and_vice_shaped() {
        let assembler = assembled("*=$1000\nzzz: nop\naaa: nop\nborder = $d020");
        let text = assembler.symbol_file();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["al C:1000 .zzz", "al C:1001 .aaa", "al C:D020 .border"]
        );
    }

    #[test]
    fn symbol_file_round_trips_values() {
        let assembler = assembled("v1 = $0801\nv2 = $c000");
        for line in assembler.symbol_file().lines() {
            let hex = line
                .split_whitespace()
                .nth(1)
                .unwrap()
                .trim_start_matches("C:");
            let name = line.split('.').next_back().unwrap();
            let parsed = u32::from_str_radix(hex, 16).unwrap() as i32;
            assert_eq!(assembler.symbol_value(name), Some(parsed));
        }
    }

    #[test]
    fn listing_shows_addresses_bytes_and_source() {
        let assembler = assembled("*=$1000\n lda #$41");
        let listing = assembler.listing();
        assert!(listing.contains("1000  A9 41"));
        assert!(listing.contains("lda #$41"));
        assert!(listing.contains("; symbols"));
    }

    #[test]
    fn long_emissions_continue_on_extra_rows() {
        let assembler = assembled("*=$1000\n!byte 1,2,3,4,5,6");
        let listing = assembler.listing();
        assert!(listing.contains("1000  01 02 03 04"));
        assert!(listing.contains("1004  05 06"));
    }

    #[test]
    fn cycle_counts_appear_when_enabled() {
        let mut assembler = Assembler::new();
        assembler.set_cycle_listing(true);
        assert!(assembler.assemble_source("*=$1000\n lda $d011,x", "cyc.asm"));
        let listing = assembler.listing();
        assert!(listing.contains("(4+)"), "listing was: {}", listing);
    }
}
