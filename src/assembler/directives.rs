//! Directive execution
//!
//! One function per directive, dispatched by name. Data directives emit
//! through the driver so both passes stay byte-for-byte in step; layout
//! directives (`!fill`, `!skip`, `!align`, `!org`, `!basic`) need their
//! sizing arguments constant already in pass 1, because later labels
//! depend on them.

use std::path::Path;

use super::{AsmError, Assembler, Pass};
use crate::files;
use crate::opcodes::Cpu;
use crate::statement::Directive;

pub(crate) fn execute(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    match directive.name.as_str() {
        "byte" | "by" | "db" | "08" => byte(asm, directive, file, line),
        "word" | "wo" | "dw" | "16" => word(asm, directive, file, line),
        "text" | "tx" => text(asm, directive, file, line),
        "pet" => pet(asm, directive, file, line),
        "scr" => scr(asm, directive, file, line),
        "null" => null(asm, directive, file, line),
        "fill" => fill(asm, directive),
        "skip" | "res" => skip(asm, directive),
        "align" => align(asm, directive, file, line),
        "org" => org(asm, directive),
        "basic" => basic(asm, directive),
        "binary" => binary(asm, directive, file),
        "pseudopc" => pseudopc(asm, directive),
        "realpc" => realpc(asm),
        "cpu" => cpu(asm, directive),
        "zone" | "zn" => zone(asm, directive),
        "error" => user_error(asm, directive),
        "warn" => warn(asm, directive, file, line),
        // these are consumed by the driver's line scan
        "source" | "src" | "include" | "macro" | "endmacro" | "endm" | "for" | "while" | "end"
        | "if" | "ifdef" | "ifndef" | "else" | "endif" => Ok(()),
        unknown => {
            if asm.pass == Pass::One {
                asm.report_warning(file, line, format!("unknown directive !{} ignored", unknown));
            }
            Ok(())
        }
    }
}

/// Evaluate an argument that has to be known already in pass 1
fn constant(asm: &mut Assembler, directive: &Directive, index: usize) -> Result<i32, AsmError> {
    let result = asm.eval_expr(&directive.args[index]);
    if !result.defined {
        return Err(AsmError::ConstantRequired {
            directive: directive.name.clone(),
        });
    }
    Ok(result.value)
}

/// Evaluate and emit one low byte, warning about truncation in pass 2
fn emit_expr_byte(
    asm: &mut Assembler,
    directive: &Directive,
    index: usize,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    let expr = &directive.args[index];
    let result = asm.eval_expr(expr);
    if asm.pass == Pass::Two {
        if !result.defined {
            let name = asm.undefined_name_in(expr);
            return Err(AsmError::UndefinedSymbol { name });
        }
        if !(-128..=255).contains(&result.value) {
            asm.report_warning(
                file,
                line,
                format!("value {} truncated to one byte", result.value),
            );
        }
    }
    asm.emit_byte((result.value & 0xff) as u8);
    Ok(())
}

fn byte(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    if directive.args.is_empty() && directive.string_arg.is_none() {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "at least one value",
            found: 0,
        });
    }
    for index in 0..directive.args.len() {
        emit_expr_byte(asm, directive, index, file, line)?;
    }
    if let Some(bytes) = &directive.string_arg {
        for &value in bytes {
            asm.emit_byte(value);
        }
    }
    Ok(())
}

fn word(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    if directive.args.is_empty() {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "at least one value",
            found: 0,
        });
    }
    for expr in &directive.args {
        let result = asm.eval_expr(expr);
        if asm.pass == Pass::Two {
            if !result.defined {
                let name = asm.undefined_name_in(expr);
                return Err(AsmError::UndefinedSymbol { name });
            }
            if !(-32768..=65535).contains(&result.value) {
                asm.report_warning(
                    file,
                    line,
                    format!("value {} truncated to two bytes", result.value),
                );
            }
        }
        asm.emit_byte((result.value & 0xff) as u8);
        asm.emit_byte(((result.value >> 8) & 0xff) as u8);
    }
    Ok(())
}

fn emit_string<F: Fn(u8) -> u8>(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
    convert: F,
) -> Result<(), AsmError> {
    if directive.string_arg.is_none() && directive.args.is_empty() {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "a string",
            found: 0,
        });
    }
    if let Some(bytes) = &directive.string_arg {
        for &value in bytes {
            asm.emit_byte(convert(value));
        }
    }
    // numeric arguments ride along unconverted
    for index in 0..directive.args.len() {
        emit_expr_byte(asm, directive, index, file, line)?;
    }
    Ok(())
}

fn text(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    emit_string(asm, directive, file, line, |byte| byte)
}

fn pet(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    emit_string(asm, directive, file, line, ascii_to_petscii)
}

fn scr(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    emit_string(asm, directive, file, line, ascii_to_screen)
}

fn null(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    emit_string(asm, directive, file, line, |byte| byte)?;
    asm.emit_byte(0x00);
    Ok(())
}

fn fill(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    if directive.args.is_empty() || directive.args.len() > 2 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "a count and an optional value",
            found: directive.args.len(),
        });
    }
    let count = constant(asm, directive, 0)?;
    if !(0..=65536).contains(&count) {
        return Err(AsmError::ValueOutOfRange {
            directive: directive.name.clone(),
            value: count,
        });
    }
    let value = match directive.args.get(1) {
        Some(expr) => {
            let result = asm.eval_expr(expr);
            if asm.pass == Pass::Two && !result.defined {
                let name = asm.undefined_name_in(expr);
                return Err(AsmError::UndefinedSymbol { name });
            }
            result.value
        }
        None => 0,
    };
    for _ in 0..count {
        asm.emit_byte((value & 0xff) as u8);
    }
    Ok(())
}

fn skip(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    if directive.args.len() != 1 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "a byte count",
            found: directive.args.len(),
        });
    }
    let count = constant(asm, directive, 0)?;
    if !(0..=65536).contains(&count) {
        return Err(AsmError::ValueOutOfRange {
            directive: directive.name.clone(),
            value: count,
        });
    }
    asm.skip_bytes(count);
    Ok(())
}

fn align(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    if directive.args.is_empty() || directive.args.len() > 2 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "an alignment and an optional fill value",
            found: directive.args.len(),
        });
    }
    let alignment = constant(asm, directive, 0)?;
    if alignment <= 0 || alignment > 65536 {
        return Err(AsmError::ValueOutOfRange {
            directive: directive.name.clone(),
            value: alignment,
        });
    }
    if asm.pass == Pass::One && alignment & (alignment - 1) != 0 {
        asm.report_warning(
            file,
            line,
            format!("alignment {} is not a power of two", alignment),
        );
    }
    let value = match directive.args.get(1) {
        Some(_) => constant(asm, directive, 1)?,
        None => 0,
    };
    while asm.pc % alignment != 0 {
        asm.emit_byte((value & 0xff) as u8);
    }
    Ok(())
}

fn org(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    if directive.args.len() != 1 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "an address",
            found: directive.args.len(),
        });
    }
    let address = constant(asm, directive, 0)?;
    asm.pc = address & 0xffff;
    if !asm.in_pseudopc {
        asm.real_pc = asm.pc;
    }
    Ok(())
}

fn decimal_digits(value: i32) -> usize {
    value.max(0).to_string().len()
}

/// Emit a BASIC bootstrap: link word, line number, the SYS token, the
/// target address in ASCII, the line terminator and the end-of-program
/// link. The default target is the byte right after the stub, which
/// needs one sizing iteration because the digit count feeds back into
/// the stub length.
fn basic(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    if directive.args.len() > 2 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "an optional line number and address",
            found: directive.args.len(),
        });
    }
    let start = asm.pc;
    let line_number = match directive.args.first() {
        Some(_) => constant(asm, directive, 0)?,
        None => 10,
    };
    let sys_target = match directive.args.get(1) {
        Some(_) => constant(asm, directive, 1)?,
        None => {
            let mut target = start + 8 + 4;
            if decimal_digits(target) > 4 {
                target = start + 8 + 5;
            }
            target
        }
    };
    let digits = sys_target.max(0).to_string();
    let link = start + 6 + digits.len() as i32;
    asm.emit_byte((link & 0xff) as u8);
    asm.emit_byte(((link >> 8) & 0xff) as u8);
    asm.emit_byte((line_number & 0xff) as u8);
    asm.emit_byte(((line_number >> 8) & 0xff) as u8);
    asm.emit_byte(0x9e);
    for digit in digits.bytes() {
        asm.emit_byte(digit);
    }
    asm.emit_byte(0x00);
    asm.emit_byte(0x00);
    asm.emit_byte(0x00);
    Ok(())
}

fn binary(asm: &mut Assembler, directive: &Directive, file: &str) -> Result<(), AsmError> {
    let Some(name_bytes) = &directive.string_arg else {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "a file name",
            found: directive.args.len(),
        });
    };
    if directive.args.len() > 2 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "a file name, an optional length and offset",
            found: directive.args.len(),
        });
    }
    let name = String::from_utf8_lossy(name_bytes).into_owned();
    let Some(path) = asm.resolver.resolve(&name, Path::new(file)) else {
        return Err(AsmError::FileNotFound { name });
    };
    let data = files::read_binary(&path)?;
    let offset = match directive.args.get(1) {
        Some(_) => constant(asm, directive, 1)?,
        None => 0,
    };
    if offset < 0 || offset as usize > data.len() {
        return Err(AsmError::ValueOutOfRange {
            directive: directive.name.clone(),
            value: offset,
        });
    }
    let offset = offset as usize;
    let length = match directive.args.first() {
        Some(_) => constant(asm, directive, 0)?,
        None => (data.len() - offset) as i32,
    };
    if length < 0 || offset + length as usize > data.len() {
        return Err(AsmError::ValueOutOfRange {
            directive: directive.name.clone(),
            value: length,
        });
    }
    for &value in &data[offset..offset + length as usize] {
        asm.emit_byte(value);
    }
    Ok(())
}

fn pseudopc(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    if directive.args.len() != 1 {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "an address",
            found: directive.args.len(),
        });
    }
    if asm.in_pseudopc {
        return Err(AsmError::NestedPseudoPc);
    }
    let address = constant(asm, directive, 0)?;
    asm.in_pseudopc = true;
    asm.pc = address & 0xffff;
    Ok(())
}

fn realpc(asm: &mut Assembler) -> Result<(), AsmError> {
    if !asm.in_pseudopc {
        return Err(AsmError::RealPcWithoutPseudoPc);
    }
    asm.pc = asm.real_pc;
    asm.in_pseudopc = false;
    Ok(())
}

fn cpu(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    let Some(bytes) = &directive.string_arg else {
        return Err(AsmError::BadArgumentCount {
            directive: directive.name.clone(),
            expected: "a processor name",
            found: 0,
        });
    };
    let name = String::from_utf8_lossy(bytes).into_owned();
    match Cpu::parse(&name) {
        Some(selected) => {
            asm.cpu = selected;
            Ok(())
        }
        None => Err(AsmError::UnknownCpu { name }),
    }
}

fn zone(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    let name = directive.idents.first().cloned().or_else(|| {
        directive
            .string_arg
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    });
    asm.zone = Some(match name {
        Some(name) => name,
        None => {
            let number = asm.zone_counter;
            asm.zone_counter += 1;
            format!("_zone_{}", number)
        }
    });
    Ok(())
}

fn user_error(asm: &mut Assembler, directive: &Directive) -> Result<(), AsmError> {
    // fire once, with every symbol known
    if asm.pass == Pass::One {
        return Ok(());
    }
    let message = directive
        .string_arg
        .as_ref()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_else(|| "error raised by !error".to_string());
    Err(AsmError::UserError { message })
}

fn warn(
    asm: &mut Assembler,
    directive: &Directive,
    file: &str,
    line: usize,
) -> Result<(), AsmError> {
    if asm.pass == Pass::Two {
        let message = directive
            .string_arg
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_else(|| "warning raised by !warn".to_string());
        asm.report_warning(file, line, message);
    }
    Ok(())
}

/// ASCII to PETSCII: letters fold into the uppercase range 0x41..=0x5A,
/// the printable range 0x20..=0x3F passes through, a few punctuation
/// bytes have fixed mappings, and everything else passes through
/// unchanged.
fn ascii_to_petscii(byte: u8) -> u8 {
    match byte {
        b'a'..=b'z' => byte - 0x20,
        b'A'..=b'Z' => byte,
        0x20..=0x3f => byte,
        b'\\' => 0x5c,
        b'[' => 0x5b,
        b']' => 0x5d,
        b'_' => 0xa4,
        _ => byte,
    }
}

/// ASCII to C64 screen codes: `@` is 0, letters are 1..=26, the
/// printable range 0x20..=0x3F passes through, and bytes outside the
/// 128-entry table pass through unchanged.
fn ascii_to_screen(byte: u8) -> u8 {
    match byte {
        b'@' => 0x00,
        b'a'..=b'z' => byte - 0x60,
        b'A'..=b'Z' => byte - 0x40,
        b'[' => 0x1b,
        b']' => 0x1d,
        0x20..=0x3f => byte,
        _ => byte,
    }
}
