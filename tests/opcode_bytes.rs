//! Golden encoding check: every supported `(mnemonic, addressing mode)`
//! pair assembles to its datasheet opcode byte. One instruction per
//! program, origin $1000, operand $44/$4400 so zero-page and absolute
//! forms are both exercised deliberately.

use c64asm::Assembler;

fn encode(line: &str) -> Vec<u8> {
    let mut assembler = Assembler::new();
    let source = format!("*=$1000\n {}", line);
    let ok = assembler.assemble_source(&source, "golden.asm");
    assert!(
        ok,
        "failed to assemble \"{}\": {:?}",
        line,
        assembler
            .diagnostics()
            .iter()
            .map(|d| d.message.clone())
            .collect::<Vec<_>>()
    );
    let (_, image) = assembler.image().expect("nothing emitted");
    image.to_vec()
}

fn check(cases: &[(&str, &[u8])]) {
    for (line, expected) in cases {
        let got = encode(line);
        assert_eq!(&got, expected, "wrong encoding for \"{}\"", line);
    }
}

#[test]
fn load_and_store_instructions() {
    check(&[
        ("lda #$44", &[0xa9, 0x44]),
        ("lda $44", &[0xa5, 0x44]),
        ("lda $44,x", &[0xb5, 0x44]),
        ("lda $4400", &[0xad, 0x00, 0x44]),
        ("lda $4400,x", &[0xbd, 0x00, 0x44]),
        ("lda $4400,y", &[0xb9, 0x00, 0x44]),
        ("lda ($44,x)", &[0xa1, 0x44]),
        ("lda ($44),y", &[0xb1, 0x44]),
        ("ldx #$44", &[0xa2, 0x44]),
        ("ldx $44", &[0xa6, 0x44]),
        ("ldx $44,y", &[0xb6, 0x44]),
        ("ldx $4400", &[0xae, 0x00, 0x44]),
        ("ldx $4400,y", &[0xbe, 0x00, 0x44]),
        ("ldy #$44", &[0xa0, 0x44]),
        ("ldy $44", &[0xa4, 0x44]),
        ("ldy $44,x", &[0xb4, 0x44]),
        ("ldy $4400", &[0xac, 0x00, 0x44]),
        ("ldy $4400,x", &[0xbc, 0x00, 0x44]),
        ("sta $44", &[0x85, 0x44]),
        ("sta $44,x", &[0x95, 0x44]),
        ("sta $4400", &[0x8d, 0x00, 0x44]),
        ("sta $4400,x", &[0x9d, 0x00, 0x44]),
        ("sta $4400,y", &[0x99, 0x00, 0x44]),
        ("sta ($44,x)", &[0x81, 0x44]),
        ("sta ($44),y", &[0x91, 0x44]),
        ("stx $44", &[0x86, 0x44]),
        ("stx $44,y", &[0x96, 0x44]),
        ("stx $4400", &[0x8e, 0x00, 0x44]),
        ("sty $44", &[0x84, 0x44]),
        ("sty $44,x", &[0x94, 0x44]),
        ("sty $4400", &[0x8c, 0x00, 0x44]),
    ]);
}

#[test]
fn arithmetic_and_logic_instructions() {
    check(&[
        ("adc #$44", &[0x69, 0x44]),
        ("adc $44", &[0x65, 0x44]),
        ("adc $44,x", &[0x75, 0x44]),
        ("adc $4400", &[0x6d, 0x00, 0x44]),
        ("adc $4400,x", &[0x7d, 0x00, 0x44]),
        ("adc $4400,y", &[0x79, 0x00, 0x44]),
        ("adc ($44,x)", &[0x61, 0x44]),
        ("adc ($44),y", &[0x71, 0x44]),
        ("sbc #$44", &[0xe9, 0x44]),
        ("sbc $44", &[0xe5, 0x44]),
        ("sbc $44,x", &[0xf5, 0x44]),
        ("sbc $4400", &[0xed, 0x00, 0x44]),
        ("sbc $4400,x", &[0xfd, 0x00, 0x44]),
        ("sbc $4400,y", &[0xf9, 0x00, 0x44]),
        ("sbc ($44,x)", &[0xe1, 0x44]),
        ("sbc ($44),y", &[0xf1, 0x44]),
        ("and #$44", &[0x29, 0x44]),
        ("and $44", &[0x25, 0x44]),
        ("and $44,x", &[0x35, 0x44]),
        ("and $4400", &[0x2d, 0x00, 0x44]),
        ("and $4400,x", &[0x3d, 0x00, 0x44]),
        ("and $4400,y", &[0x39, 0x00, 0x44]),
        ("and ($44,x)", &[0x21, 0x44]),
        ("and ($44),y", &[0x31, 0x44]),
        ("ora #$44", &[0x09, 0x44]),
        ("ora $44", &[0x05, 0x44]),
        ("ora $44,x", &[0x15, 0x44]),
        ("ora $4400", &[0x0d, 0x00, 0x44]),
        ("ora $4400,x", &[0x1d, 0x00, 0x44]),
        ("ora $4400,y", &[0x19, 0x00, 0x44]),
        ("ora ($44,x)", &[0x01, 0x44]),
        ("ora ($44),y", &[0x11, 0x44]),
        ("eor #$44", &[0x49, 0x44]),
        ("eor $44", &[0x45, 0x44]),
        ("eor $44,x", &[0x55, 0x44]),
        ("eor $4400", &[0x4d, 0x00, 0x44]),
        ("eor $4400,x", &[0x5d, 0x00, 0x44]),
        ("eor $4400,y", &[0x59, 0x00, 0x44]),
        ("eor ($44,x)", &[0x41, 0x44]),
        ("eor ($44),y", &[0x51, 0x44]),
        ("cmp #$44", &[0xc9, 0x44]),
        ("cmp $44", &[0xc5, 0x44]),
        ("cmp $44,x", &[0xd5, 0x44]),
        ("cmp $4400", &[0xcd, 0x00, 0x44]),
        ("cmp $4400,x", &[0xdd, 0x00, 0x44]),
        ("cmp $4400,y", &[0xd9, 0x00, 0x44]),
        ("cmp ($44,x)", &[0xc1, 0x44]),
        ("cmp ($44),y", &[0xd1, 0x44]),
        ("cpx #$44", &[0xe0, 0x44]),
        ("cpx $44", &[0xe4, 0x44]),
        ("cpx $4400", &[0xec, 0x00, 0x44]),
        ("cpy #$44", &[0xc0, 0x44]),
        ("cpy $44", &[0xc4, 0x44]),
        ("cpy $4400", &[0xcc, 0x00, 0x44]),
        ("bit $44", &[0x24, 0x44]),
        ("bit $4400", &[0x2c, 0x00, 0x44]),
    ]);
}

#[test]
fn read_modify_write_instructions() {
    check(&[
        ("inc $44", &[0xe6, 0x44]),
        ("inc $44,x", &[0xf6, 0x44]),
        ("inc $4400", &[0xee, 0x00, 0x44]),
        ("inc $4400,x", &[0xfe, 0x00, 0x44]),
        ("dec $44", &[0xc6, 0x44]),
        ("dec $44,x", &[0xd6, 0x44]),
        ("dec $4400", &[0xce, 0x00, 0x44]),
        ("dec $4400,x", &[0xde, 0x00, 0x44]),
        ("asl", &[0x0a]),
        ("asl a", &[0x0a]),
        ("asl $44", &[0x06, 0x44]),
        ("asl $44,x", &[0x16, 0x44]),
        ("asl $4400", &[0x0e, 0x00, 0x44]),
        ("asl $4400,x", &[0x1e, 0x00, 0x44]),
        ("lsr", &[0x4a]),
        ("lsr $44", &[0x46, 0x44]),
        ("lsr $44,x", &[0x56, 0x44]),
        ("lsr $4400", &[0x4e, 0x00, 0x44]),
        ("lsr $4400,x", &[0x5e, 0x00, 0x44]),
        ("rol", &[0x2a]),
        ("rol $44", &[0x26, 0x44]),
        ("rol $44,x", &[0x36, 0x44]),
        ("rol $4400", &[0x2e, 0x00, 0x44]),
        ("rol $4400,x", &[0x3e, 0x00, 0x44]),
        ("ror", &[0x6a]),
        ("ror $44", &[0x66, 0x44]),
        ("ror $44,x", &[0x76, 0x44]),
        ("ror $4400", &[0x6e, 0x00, 0x44]),
        ("ror $4400,x", &[0x7e, 0x00, 0x44]),
    ]);
}

#[test]
fn jump_branch_and_flag_instructions() {
    check(&[
        ("jmp $4400", &[0x4c, 0x00, 0x44]),
        ("jmp ($4400)", &[0x6c, 0x00, 0x44]),
        ("jsr $4400", &[0x20, 0x00, 0x44]),
        ("rts", &[0x60]),
        ("rti", &[0x40]),
        ("brk", &[0x00]),
        ("bpl *+2", &[0x10, 0x00]),
        ("bmi *+2", &[0x30, 0x00]),
        ("bvc *+2", &[0x50, 0x00]),
        ("bvs *+2", &[0x70, 0x00]),
        ("bcc *+2", &[0x90, 0x00]),
        ("bcs *+2", &[0xb0, 0x00]),
        ("bne *+2", &[0xd0, 0x00]),
        ("beq *+2", &[0xf0, 0x00]),
        ("clc", &[0x18]),
        ("sec", &[0x38]),
        ("cld", &[0xd8]),
        ("sed", &[0xf8]),
        ("cli", &[0x58]),
        ("sei", &[0x78]),
        ("clv", &[0xb8]),
        ("nop", &[0xea]),
    ]);
}

#[test]
fn transfer_and_stack_instructions() {
    check(&[
        ("tax", &[0xaa]),
        ("txa", &[0x8a]),
        ("tay", &[0xa8]),
        ("tya", &[0x98]),
        ("tsx", &[0xba]),
        ("txs", &[0x9a]),
        ("pha", &[0x48]),
        ("pla", &[0x68]),
        ("php", &[0x08]),
        ("plp", &[0x28]),
    ]);
}

#[test]
fn undocumented_instructions_on_the_6510() {
    check(&[
        ("slo $44", &[0x07, 0x44]),
        ("slo $44,x", &[0x17, 0x44]),
        ("slo $4400", &[0x0f, 0x00, 0x44]),
        ("slo $4400,x", &[0x1f, 0x00, 0x44]),
        ("slo $4400,y", &[0x1b, 0x00, 0x44]),
        ("slo ($44,x)", &[0x03, 0x44]),
        ("slo ($44),y", &[0x13, 0x44]),
        ("rla $44", &[0x27, 0x44]),
        ("rla $4400", &[0x2f, 0x00, 0x44]),
        ("sre $44", &[0x47, 0x44]),
        ("sre $4400", &[0x4f, 0x00, 0x44]),
        ("rra $44", &[0x67, 0x44]),
        ("rra $4400", &[0x6f, 0x00, 0x44]),
        ("sax $44", &[0x87, 0x44]),
        ("sax $44,y", &[0x97, 0x44]),
        ("sax $4400", &[0x8f, 0x00, 0x44]),
        ("sax ($44,x)", &[0x83, 0x44]),
        ("lax $44", &[0xa7, 0x44]),
        ("lax $44,y", &[0xb7, 0x44]),
        ("lax $4400", &[0xaf, 0x00, 0x44]),
        ("lax $4400,y", &[0xbf, 0x00, 0x44]),
        ("lax ($44,x)", &[0xa3, 0x44]),
        ("lax ($44),y", &[0xb3, 0x44]),
        ("dcp $44", &[0xc7, 0x44]),
        ("dcp $4400", &[0xcf, 0x00, 0x44]),
        ("isc $44", &[0xe7, 0x44]),
        ("isc $4400", &[0xef, 0x00, 0x44]),
        ("anc #$44", &[0x0b, 0x44]),
        ("alr #$44", &[0x4b, 0x44]),
        ("arr #$44", &[0x6b, 0x44]),
        ("xaa #$44", &[0x8b, 0x44]),
        ("axs #$44", &[0xcb, 0x44]),
        ("ahx ($44),y", &[0x93, 0x44]),
        ("ahx $4400,y", &[0x9f, 0x00, 0x44]),
        ("shy $4400,x", &[0x9c, 0x00, 0x44]),
        ("shx $4400,y", &[0x9e, 0x00, 0x44]),
        ("tas $4400,y", &[0x9b, 0x00, 0x44]),
        ("las $4400,y", &[0xbb, 0x00, 0x44]),
        ("kil", &[0x02]),
    ]);
}

#[test]
fn undocumented_aliases_encode_identically() {
    check(&[
        ("dcm $44", &[0xc7, 0x44]),
        ("isb $44", &[0xe7, 0x44]),
        ("aso $44", &[0x07, 0x44]),
        ("lse $44", &[0x47, 0x44]),
        ("sha ($44),y", &[0x93, 0x44]),
        ("lar $4400,y", &[0xbb, 0x00, 0x44]),
        ("hlt", &[0x02]),
        ("jam", &[0x02]),
    ]);
}

#[test]
fn mnemonic_case_is_irrelevant() {
    check(&[
        ("LDA #$44", &[0xa9, 0x44]),
        ("Lda #$44", &[0xa9, 0x44]),
        ("STA $4400,X", &[0x9d, 0x00, 0x44]),
        ("JMP ($4400)", &[0x6c, 0x00, 0x44]),
    ]);
}
