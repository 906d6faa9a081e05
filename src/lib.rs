//! A two-pass cross-assembler for the MOS 6502/6510/65C02, targeting
//! Commodore 64 development. It accepts an ACME-compatible dialect and
//! produces a 64 KiB byte image plus optional artifacts:
//! - a program file with a two-byte load-address header (`.prg`)
//! - a raw binary without the header
//! - a VICE-compatible symbol file
//! - an assembly listing
//!
//! The pipeline runs entirely in memory: the lexer turns source characters
//! into tokens, the statement parser reconstructs labels, instructions,
//! directives, assignments and macro calls, and the driver assembles
//! everything in two passes so forward references resolve without moving
//! any label committed in pass 1.
//!
//! Comments start with a semicolon (`;`) and continue to the end of the
//! line. Symbol lookup is case-insensitive. Labels starting with `.` are
//! local to the current zone; `+` and `-` alone are anonymous labels,
//! referenced by repeating the sign.
//!
//! Supported directives: `!byte`/`!by`/`!db`/`!08`, `!word`/`!wo`/`!dw`/`!16`,
//! `!text`/`!tx`, `!pet`, `!scr`, `!null`, `!fill`, `!skip`/`!res`,
//! `!align`, `!org` (also spelled `*=`), `!basic`, `!binary`,
//! `!pseudopc`/`!realpc`, `!cpu`, `!zone`/`!zn`, `!error`, `!warn`,
//! `!source`/`!src`/`!include`, `!macro`/`!endmacro`/`!endm`,
//! `!for`/`!while`/`!end`, and `!if`/`!ifdef`/`!ifndef`/`!else`/`!endif`.

pub mod assembler;
pub mod expr;
pub mod files;
pub mod lexer;
pub mod logging;
pub mod opcodes;
pub mod output;
pub mod statement;
pub mod symbols;

pub use assembler::{Assembler, Diagnostic, Level};
pub use opcodes::Cpu;
