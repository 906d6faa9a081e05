//! Error reporting end to end: every diagnostic family the assembler
//! can produce, driven through real source text. Assembly must fail
//! (or warn) the way the message says, and the partial image stays
//! inspectable.

use c64asm::{Assembler, Level};

fn diagnose(source: &str) -> (bool, Assembler) {
    let mut assembler = Assembler::new();
    let ok = assembler.assemble_source(source, "errors.asm");
    (ok, assembler)
}

fn assert_error_containing(source: &str, needle: &str) {
    let (ok, assembler) = diagnose(source);
    assert!(!ok, "expected \"{}\" to fail assembly", source);
    assert!(
        assembler
            .diagnostics()
            .iter()
            .any(|d| d.level == Level::Error && d.message.contains(needle)),
        "no error containing \"{}\" in {:?}",
        needle,
        assembler
            .diagnostics()
            .iter()
            .map(|d| d.message.clone())
            .collect::<Vec<_>>()
    );
}

fn assert_warning_containing(source: &str, needle: &str) {
    let (ok, assembler) = diagnose(source);
    assert!(ok, "warnings must not fail assembly: \"{}\"", source);
    assert!(
        assembler
            .diagnostics()
            .iter()
            .any(|d| d.level == Level::Warning && d.message.contains(needle)),
        "no warning containing \"{}\" in {:?}",
        needle,
        assembler
            .diagnostics()
            .iter()
            .map(|d| d.message.clone())
            .collect::<Vec<_>>()
    );
}

// ---------------------------------------------------------------------
// Lexical errors

#[test]
fn unterminated_string() {
    assert_error_containing("!text \"abc", "unterminated string");
}

#[test]
fn unterminated_character() {
    assert_error_containing("!byte 'a", "unterminated character");
}

#[test]
fn unknown_escape() {
    assert_error_containing("!text \"a\\qb\"", "unknown escape");
}

#[test]
fn decimal_overflow() {
    assert_error_containing("!word 99999999999", "32 bits");
}

#[test]
fn hex_literal_too_long() {
    assert_error_containing("!word $112233445", "32 bits");
}

#[test]
fn unexpected_character() {
    assert_error_containing("`", "unexpected character");
}

// ---------------------------------------------------------------------
// Syntactic errors

#[test]
fn missing_closing_paren() {
    assert_error_containing("*=$1000\n lda ($10\n", "expected )");
}

#[test]
fn assignment_without_rhs() {
    assert_error_containing("speed =", "no right-hand side");
}

#[test]
fn missing_expression() {
    assert_error_containing("!byte ,", "expected an expression");
}

#[test]
fn origin_without_equals() {
    assert_error_containing("* $1000", "expected =");
}

#[test]
fn garbage_statement() {
    assert_error_containing("???", "unexpected character");
}

// ---------------------------------------------------------------------
// Semantic errors

#[test]
fn undefined_symbol_in_pass_two() {
    assert_error_containing("*=$1000\n lda nowhere", "undefined symbol \"nowhere\"");
}

#[test]
fn undefined_local_symbol_names_the_reference() {
    assert_error_containing("*=$1000\nzone_a:\n lda .gone", "undefined symbol");
}

#[test]
fn duplicate_constant() {
    assert_error_containing("x = 1\nx = 2", "constant");
}

#[test]
fn label_cannot_shadow_a_constant() {
    assert_error_containing("x = 1\n*=$1000\nx: nop", "constant");
}

#[test]
fn invalid_addressing_mode() {
    assert_error_containing("*=$1000\n sta #$10", "invalid addressing mode");
}

#[test]
fn implied_mode_where_none_exists() {
    assert_error_containing("*=$1000\n lda", "invalid addressing mode");
}

#[test]
fn branch_out_of_range_backward() {
    let mut source = String::from("*=$1000\ntarget: rts\n");
    for _ in 0..140 {
        source.push_str(" nop\n");
    }
    source.push_str(" bne target\n");
    assert_error_containing(&source, "branch target out of range");
}

#[test]
fn illegal_opcode_on_6502() {
    assert_error_containing("!cpu 6502\n*=$1000\n lax $10", "illegal opcode");
}

#[test]
fn illegal_opcode_alias_on_65c02() {
    assert_error_containing("!cpu 65c02\n*=$1000\n dcm $10", "illegal opcode");
}

// ---------------------------------------------------------------------
// Directive errors

#[test]
fn fill_needs_a_constant_count() {
    assert_error_containing("*=$1000\n!fill n\nn = 3", "constant");
}

#[test]
fn fill_count_out_of_range() {
    assert_error_containing("*=$1000\n!fill 65537", "out of range");
}

#[test]
fn skip_without_argument() {
    assert_error_containing("*=$1000\n!skip", "byte count");
}

#[test]
fn align_of_zero() {
    assert_error_containing("*=$1000\n!align 0", "out of range");
}

#[test]
fn unknown_cpu_name() {
    assert_error_containing("!cpu z80", "unknown processor");
}

#[test]
fn binary_file_missing() {
    assert_error_containing("*=$1000\n!binary \"no-such-file.bin\"", "not found");
}

#[test]
fn source_file_missing() {
    assert_error_containing("!source \"no-such-file.asm\"", "not found");
}

#[test]
fn nested_pseudopc() {
    assert_error_containing(
        "*=$1000\n!pseudopc $c000\n!pseudopc $d000\n!realpc",
        "cannot nest",
    );
}

#[test]
fn realpc_without_pseudopc() {
    assert_error_containing("*=$1000\n!realpc", "without a matching !pseudopc");
}

#[test]
fn else_without_if() {
    assert_error_containing("!else", "!else without !if");
}

#[test]
fn endif_without_if() {
    assert_error_containing("!endif", "!endif without !if");
}

#[test]
fn duplicate_else() {
    assert_error_containing("!if 1\n!else\n!else\n!endif", "duplicate !else");
}

#[test]
fn unterminated_if() {
    assert_error_containing("!if 1\n!byte 1", "unterminated !if");
}

#[test]
fn unterminated_macro() {
    assert_error_containing("!macro broken\n nop", "unterminated !macro");
}

#[test]
fn unterminated_loop() {
    assert_error_containing("!for i, 1, 3\n!byte i", "unterminated loop");
}

#[test]
fn stray_end() {
    assert_error_containing("!end", "without a matching opener");
}

#[test]
fn stray_endmacro() {
    assert_error_containing("!endmacro", "without a matching opener");
}

#[test]
fn undefined_macro_call() {
    assert_error_containing("*=$1000\n+nothing", "undefined macro");
}

#[test]
fn macro_argument_count_mismatch() {
    assert_error_containing(
        "!macro pair a, b\n!byte a, b\n!endmacro\n*=$1000\n+pair 1",
        "takes 2 arguments",
    );
}

#[test]
fn user_error_directive() {
    assert_error_containing("!error \"configuration is broken\"", "configuration is broken");
}

// ---------------------------------------------------------------------
// Resource errors

#[test]
fn macro_recursion_depth() {
    assert_error_containing(
        "!macro forever\n+forever\n!endmacro\n*=$1000\n+forever",
        "macro expansion too deep",
    );
}

#[test]
fn while_iteration_cap() {
    assert_error_containing("always = 1\n!while always\n nop\n!end", "iteration cap");
}

#[test]
fn error_cap_halts() {
    let mut assembler = Assembler::new();
    assembler.set_max_errors(5);
    let mut source = String::new();
    for _ in 0..50 {
        source.push_str("@@@\n");
    }
    assert!(!assembler.assemble_source(&source, "flood.asm"));
    assert!(
        assembler
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("too many errors"))
    );
    // the cap bounds the error count, the flood does not
    assert!(assembler.error_count() <= 6);
}

// ---------------------------------------------------------------------
// Warnings

#[test]
fn byte_truncation_warns() {
    assert_warning_containing("*=$1000\n!byte 300", "truncated to one byte");
}

#[test]
fn immediate_truncation_warns() {
    assert_warning_containing("*=$1000\n lda #$1234", "truncated to one byte");
}

#[test]
fn word_truncation_warns() {
    assert_warning_containing("*=$1000\n!word 70000", "truncated to two bytes");
}

#[test]
fn align_power_of_two_warning() {
    assert_warning_containing("*=$1001\n!align 3", "not a power of two");
}

#[test]
fn unknown_directive_warns_and_continues() {
    assert_warning_containing("*=$1000\n!whatever 1, 2\n nop", "unknown directive");
}

#[test]
fn warnings_never_change_the_outcome() {
    let (ok, assembler) = diagnose("*=$1000\n!byte 300\n!warn \"check me\"\n nop");
    assert!(ok);
    assert_eq!(assembler.error_count(), 0);
    assert!(assembler.warning_count() >= 2);
}

// ---------------------------------------------------------------------
// Diagnostic records

#[test]
fn diagnostics_carry_file_and_line() {
    let (_, assembler) = diagnose("*=$1000\n nop\n lda nowhere\n");
    let diagnostic = assembler
        .diagnostics()
        .iter()
        .find(|d| d.message.contains("nowhere"))
        .expect("missing diagnostic");
    assert_eq!(diagnostic.file, "errors.asm");
    assert_eq!(diagnostic.line, 3);
    assert_eq!(diagnostic.level, Level::Error);
}

#[test]
fn partial_image_survives_failure() {
    let (ok, assembler) = diagnose("*=$1000\n!byte 1, 2\n lda nowhere\n");
    assert!(!ok);
    let (load, image) = assembler.image().expect("partial image must remain");
    assert_eq!(load, 0x1000);
    assert_eq!(&image[..2], &[1, 2]);
}
