//! Symbol storage, zone mangling and anonymous-label tracking
//!
//! One table holds every symbol of the assembly, keyed by upper-cased
//! name so lookup is case-insensitive. Local labels (leading `.`) never
//! reach the table under their written name; they are mangled through the
//! current zone first.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolFlags: u8 {
        /// The value has been committed
        const DEFINED      = 0b0000_0001;
        /// The value fit in 0x00..=0xFF and was known to at definition
        const ZEROPAGE     = 0b0000_0010;
        /// Defined with `=` outside a loop in pass 1; silent redefinition
        /// is forbidden
        const CONSTANT     = 0b0000_0100;
        /// The symbol has been looked up at least once
        const REFERENCED   = 0b0000_1000;
        const LOCAL        = 0b0001_0000;
        const EXPORTED     = 0b0010_0000;
        /// Transient request to overwrite even a CONSTANT binding
        const FORCE_UPDATE = 0b0100_0000;
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    /// The name as written in the source, for listings and symbol files
    pub name: String,
    pub value: i32,
    pub flags: SymbolFlags,
}

/// Mangle a local name through the current zone. `.loop` becomes
/// `<zone>.loop`, or `_global.loop` when no zone is active. Non-local
/// names pass through unchanged.
pub fn mangle_local(name: &str, zone: Option<&str>) -> String {
    match name.strip_prefix('.') {
        Some(bare) => format!("{}.{}", zone.unwrap_or("_global"), bare),
        None => name.to_string(),
    }
}

fn canonical_key(name: &str) -> String {
    name.to_uppercase()
}

fn fits_zeropage(value: i32) -> bool {
    (0..=0xff).contains(&value)
}

/// The symbol table. A name maps to at most one symbol within the whole
/// assembly.
pub struct SymbolTable {
    map: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            map: HashMap::new(),
        }
    }

    /// Insert or update a symbol. Returns `None` when the existing entry
    /// is CONSTANT and the request does not carry FORCE_UPDATE; the
    /// caller reports that as a duplicate-constant error.
    ///
    /// The ZEROPAGE flag is monotonic: once a value proved to exceed
    /// 0xFF, the flag stays cleared across later definitions.
    pub fn define(&mut self, name: &str, value: i32, flags: SymbolFlags) -> Option<&Symbol> {
        let key = canonical_key(name);
        let fits = fits_zeropage(value);
        match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                let symbol = occupied.get_mut();
                if symbol.flags.contains(SymbolFlags::CONSTANT) {
                    if !flags.contains(SymbolFlags::FORCE_UPDATE) {
                        return None;
                    }
                    symbol.flags.remove(SymbolFlags::CONSTANT);
                }
                let was_known_large = symbol.flags.contains(SymbolFlags::DEFINED)
                    && !symbol.flags.contains(SymbolFlags::ZEROPAGE);
                let mut incoming = flags & !SymbolFlags::FORCE_UPDATE;
                if !fits || was_known_large {
                    incoming.remove(SymbolFlags::ZEROPAGE);
                }
                symbol.value = value;
                symbol.flags |= incoming | SymbolFlags::DEFINED;
                if !fits {
                    symbol.flags.remove(SymbolFlags::ZEROPAGE);
                }
                Some(occupied.into_mut())
            }
            Entry::Vacant(vacant) => {
                let mut flags = (flags & !SymbolFlags::FORCE_UPDATE) | SymbolFlags::DEFINED;
                if !fits {
                    flags.remove(SymbolFlags::ZEROPAGE);
                }
                Some(vacant.insert(Symbol {
                    name: name.to_string(),
                    value,
                    flags,
                }))
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.map.get(&canonical_key(name))
    }

    /// Look a symbol up and mark it REFERENCED
    pub fn touch(&mut self, name: &str) -> Option<&Symbol> {
        let key = canonical_key(name);
        if let Some(symbol) = self.map.get_mut(&key) {
            symbol.flags.insert(SymbolFlags::REFERENCED);
        }
        self.map.get(&key)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name)
            .is_some_and(|symbol| symbol.flags.contains(SymbolFlags::DEFINED))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All DEFINED symbols, sorted by `(value, name)` ascending. Output
    /// formatters rely on this explicit order; hash iteration order must
    /// never leak into an artifact.
    pub fn defined_sorted(&self) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = self
            .map
            .values()
            .filter(|symbol| symbol.flags.contains(SymbolFlags::DEFINED))
            .collect();
        symbols.sort_by(|a, b| {
            a.value
                .cmp(&b.value)
                .then_with(|| a.name.cmp(&b.name))
        });
        symbols
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable::new()
    }
}

/// One anonymous-label position
#[derive(Debug, Clone)]
pub struct AnonRecord {
    pub address: i32,
    pub file: String,
    pub line: usize,
}

/// Tracker for `+`/`-` anonymous labels. Both sequences are append-only
/// and ordered by encounter. Between passes the backward list is cleared
/// and the forward cursor reset; the forward list itself is preserved so
/// pass 2 resolves references to the same positions.
pub struct AnonLabels {
    forward: Vec<AnonRecord>,
    backward: Vec<AnonRecord>,
    forward_index: usize,
}

impl AnonLabels {
    pub fn new() -> AnonLabels {
        AnonLabels {
            forward: Vec::new(),
            backward: Vec::new(),
            forward_index: 0,
        }
    }

    pub fn push_forward(&mut self, address: i32, file: &str, line: usize) {
        self.forward.push(AnonRecord {
            address,
            file: file.to_string(),
            line,
        });
    }

    pub fn push_backward(&mut self, address: i32, file: &str, line: usize) {
        self.backward.push(AnonRecord {
            address,
            file: file.to_string(),
            line,
        });
    }

    /// Resolve a forward reference of the given count and advance the
    /// cursor past one definition.
    pub fn read_forward(&mut self, count: usize) -> Option<i32> {
        let index = self.forward_index + count.max(1) - 1;
        let address = self.forward.get(index)?.address;
        self.forward_index += 1;
        Some(address)
    }

    /// Like [`AnonLabels::read_forward`] but without moving the cursor
    pub fn peek_forward(&self, count: usize) -> Option<i32> {
        let index = self.forward_index + count.max(1) - 1;
        self.forward.get(index).map(|record| record.address)
    }

    /// Resolve a backward reference: `-` is the most recent definition,
    /// `--` the one before it, and so on.
    pub fn read_backward(&self, count: usize) -> Option<i32> {
        let count = count.max(1);
        if count > self.backward.len() {
            return None;
        }
        Some(self.backward[self.backward.len() - count].address)
    }

    /// Reset for pass 2: keep forward definitions, forget everything else
    pub fn reset_for_second_pass(&mut self) {
        self.backward.clear();
        self.forward_index = 0;
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
        self.forward_index = 0;
    }
}

impl Default for AnonLabels {
    fn default() -> Self {
        AnonLabels::new()
    }
}
