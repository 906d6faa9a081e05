//! Statement types and the per-line parser
//!
//! One statement per logical line. A line optionally opens with a label
//! (global, local, or anonymous), followed by an instruction, a
//! directive, an assignment or a macro call. Trailing tokens after a
//! parsed construct are consumed silently.

use crate::assembler::AsmError;
use crate::expr::{Expr, parse_expression};
use crate::lexer::{TokenCursor, TokenKind, describe};
use crate::opcodes::{self, AddrMode, OperandShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Global,
    Local,
    AnonForward,
    AnonBackward,
}

/// A label attached to the front of a statement
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Written name; empty for anonymous labels
    pub name: String,
    pub kind: LabelKind,
}

/// An instruction statement. The shape fields come from the parser; the
/// mode, opcode, size and cycle fields are committed by pass 1 and must
/// not change size afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub mnemonic: String,
    pub shape: OperandShape,
    pub operand: Option<Expr>,
    pub mode: AddrMode,
    pub opcode: u8,
    pub size: u8,
    pub cycles: u8,
    pub page_penalty: bool,
}

/// A directive statement; the name is stored without the leading `!`
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<Expr>,
    pub string_arg: Option<Vec<u8>>,
    /// Identifier arguments: the macro name and its parameters for
    /// `!macro`, the loop variable for `!for`, the zone or symbol name
    /// for `!zone`/`!ifdef`/`!ifndef`
    pub idents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub expr: Expr,
}

/// A macro invocation; arguments are kept as raw text because expansion
/// substitutes them word-by-word into the body
#[derive(Debug, Clone, PartialEq)]
pub struct MacroCall {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum StatementBody {
    #[default]
    Empty,
    Instruction(Instruction),
    Directive(Directive),
    Assignment(Assignment),
    MacroCall(MacroCall),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub label: Option<Label>,
    pub body: StatementBody,
}

impl Statement {
    pub fn directive(&self) -> Option<&Directive> {
        match &self.body {
            StatementBody::Directive(directive) => Some(directive),
            _ => None,
        }
    }

    pub fn directive_named(&self, names: &[&str]) -> bool {
        self.directive()
            .is_some_and(|directive| names.contains(&directive.name.as_str()))
    }
}

/// Parse one source line into a statement. Parse failures become an
/// error statement rather than aborting, so the driver can count them
/// and keep going.
pub fn parse_line(text: &str) -> Statement {
    match try_parse_line(text) {
        Ok(statement) => statement,
        Err(error) => Statement {
            label: None,
            body: StatementBody::Error(error.to_string()),
        },
    }
}

fn try_parse_line(text: &str) -> Result<Statement, AsmError> {
    let mut cursor = TokenCursor::new(text)?;
    let mut statement = Statement::default();

    if cursor.at_line_end() {
        return Ok(statement);
    }

    // A leading identifier or anonymous run may be a label, an
    // assignment target, or the instruction itself.
    match cursor.kind().clone() {
        TokenKind::Ident(name) => {
            if opcodes::is_mnemonic(&name) {
                cursor.bump()?;
                statement.body = parse_instruction(name, &mut cursor)?;
                return Ok(statement);
            }
            cursor.bump()?;
            match cursor.kind().clone() {
                TokenKind::Colon => {
                    cursor.bump()?;
                    statement.label = Some(Label {
                        name,
                        kind: LabelKind::Global,
                    });
                }
                TokenKind::Equals => {
                    cursor.bump()?;
                    statement.body = parse_assignment(name, &mut cursor)?;
                    return Ok(statement);
                }
                _ => {
                    statement.label = Some(Label {
                        name,
                        kind: LabelKind::Global,
                    });
                }
            }
        }
        TokenKind::LocalIdent(name) => {
            cursor.bump()?;
            match cursor.kind().clone() {
                TokenKind::Colon => {
                    cursor.bump()?;
                    statement.label = Some(Label {
                        name,
                        kind: LabelKind::Local,
                    });
                }
                TokenKind::Equals => {
                    cursor.bump()?;
                    statement.body = parse_assignment(name, &mut cursor)?;
                    return Ok(statement);
                }
                _ => {
                    statement.label = Some(Label {
                        name,
                        kind: LabelKind::Local,
                    });
                }
            }
        }
        TokenKind::AnonForward(_) => {
            cursor.bump()?;
            if *cursor.kind() == TokenKind::Colon {
                cursor.bump()?;
            }
            statement.label = Some(Label {
                name: String::new(),
                kind: LabelKind::AnonForward,
            });
        }
        TokenKind::AnonBackward(_) => {
            cursor.bump()?;
            if *cursor.kind() == TokenKind::Colon {
                cursor.bump()?;
            }
            statement.label = Some(Label {
                name: String::new(),
                kind: LabelKind::AnonBackward,
            });
        }
        _ => {}
    }

    if cursor.at_line_end() {
        return Ok(statement);
    }

    match cursor.kind().clone() {
        TokenKind::Directive(name) => {
            cursor.bump()?;
            statement.body = parse_directive(name, &mut cursor)?;
        }
        TokenKind::MacroCall(name) => {
            let token = cursor.bump()?;
            statement.body = parse_macro_call(name, token.span.end(), text);
        }
        TokenKind::Ident(name) if opcodes::is_mnemonic(&name) => {
            cursor.bump()?;
            statement.body = parse_instruction(name, &mut cursor)?;
        }
        TokenKind::Ident(name) => {
            cursor.bump()?;
            if *cursor.kind() == TokenKind::Equals {
                cursor.bump()?;
                statement.body = parse_assignment(name, &mut cursor)?;
            } else {
                statement.body = StatementBody::Error(format!(
                    "\"{}\" is not an instruction, directive or assignment",
                    name
                ));
            }
        }
        TokenKind::LocalIdent(name) => {
            cursor.bump()?;
            if *cursor.kind() == TokenKind::Equals {
                cursor.bump()?;
                statement.body = parse_assignment(name, &mut cursor)?;
            } else {
                statement.body = StatementBody::Error(format!(
                    "\"{}\" is not an instruction, directive or assignment",
                    name
                ));
            }
        }
        TokenKind::Star => {
            // the `*= expr` origin form, lowered to `!org`
            cursor.bump()?;
            if *cursor.kind() != TokenKind::Equals {
                return Err(AsmError::ExpectedToken {
                    expected: "=",
                    found: describe(cursor.kind()),
                });
            }
            cursor.bump()?;
            let target = parse_expression(&mut cursor)?;
            statement.body = StatementBody::Directive(Directive {
                name: "org".to_string(),
                args: vec![target],
                string_arg: None,
                idents: Vec::new(),
            });
        }
        other => {
            statement.body = StatementBody::Error(format!(
                "expected an instruction, directive or assignment, found {}",
                describe(&other)
            ));
        }
    }
    Ok(statement)
}

fn parse_assignment(name: String, cursor: &mut TokenCursor) -> Result<StatementBody, AsmError> {
    if cursor.at_line_end() {
        return Err(AsmError::MissingRightHandSide { name });
    }
    let expr = parse_expression(cursor)?;
    Ok(StatementBody::Assignment(Assignment { name, expr }))
}

/// Operand grammar:
///
/// ```text
/// operand := '#' expression                            -- immediate
///          | '(' expression [',' 'X'] ')' [',' 'Y']    -- indirect
///          | expression [',' ('X' | 'Y')]              -- direct/indexed
///          | 'A'                                       -- accumulator
///          | (nothing)                                 -- implied
/// ```
fn parse_instruction(mnemonic: String, cursor: &mut TokenCursor) -> Result<StatementBody, AsmError> {
    let mut shape = OperandShape::default();
    let mut operand = None;

    let bare_accumulator = if accepts_bare_accumulator(&mnemonic)
        && matches!(cursor.kind(), TokenKind::Ident(word) if word.eq_ignore_ascii_case("a"))
    {
        peek_ends_operand(cursor)?
    } else {
        false
    };

    if bare_accumulator {
        cursor.bump()?;
        shape.accumulator = true;
    } else if !cursor.at_line_end() {
        match cursor.kind().clone() {
            TokenKind::Hash => {
                cursor.bump()?;
                shape.immediate = true;
                shape.has_operand = true;
                operand = Some(parse_expression(cursor)?);
            }
            TokenKind::LParen => {
                cursor.bump()?;
                shape.indirect = true;
                shape.has_operand = true;
                operand = Some(parse_expression(cursor)?);
                if *cursor.kind() == TokenKind::Comma {
                    cursor.bump()?;
                    expect_register(cursor, 'x')?;
                    shape.index_x = true;
                }
                if *cursor.kind() != TokenKind::RParen {
                    return Err(AsmError::ExpectedToken {
                        expected: ")",
                        found: describe(cursor.kind()),
                    });
                }
                cursor.bump()?;
                if *cursor.kind() == TokenKind::Comma {
                    cursor.bump()?;
                    expect_register(cursor, 'y')?;
                    shape.index_y = true;
                }
            }
            _ => {
                shape.has_operand = true;
                operand = Some(parse_expression(cursor)?);
                if *cursor.kind() == TokenKind::Comma {
                    cursor.bump()?;
                    let register = expect_any_register(cursor)?;
                    if register == 'x' {
                        shape.index_x = true;
                    } else {
                        shape.index_y = true;
                    }
                }
            }
        }
    }

    Ok(StatementBody::Instruction(Instruction {
        mnemonic,
        shape,
        operand,
        mode: AddrMode::Implied,
        opcode: 0,
        size: 0,
        cycles: 0,
        page_penalty: false,
    }))
}

fn accepts_bare_accumulator(mnemonic: &str) -> bool {
    matches!(
        mnemonic.to_uppercase().as_str(),
        "ASL" | "LSR" | "ROL" | "ROR"
    )
}

fn peek_ends_operand(cursor: &mut TokenCursor) -> Result<bool, AsmError> {
    Ok(matches!(
        cursor.peek_next()?.kind,
        TokenKind::Eol | TokenKind::Eof
    ))
}

fn expect_register(cursor: &mut TokenCursor, register: char) -> Result<(), AsmError> {
    let wanted = if register == 'x' { "x" } else { "y" };
    let matched = matches!(
        cursor.kind(),
        TokenKind::Ident(name) if name.eq_ignore_ascii_case(wanted)
    );
    if matched {
        cursor.bump()?;
        Ok(())
    } else {
        Err(AsmError::ExpectedToken {
            expected: if register == 'x' { "X" } else { "Y" },
            found: describe(cursor.kind()),
        })
    }
}

fn expect_any_register(cursor: &mut TokenCursor) -> Result<char, AsmError> {
    match cursor.kind().clone() {
        TokenKind::Ident(name) if name.eq_ignore_ascii_case("x") => {
            cursor.bump()?;
            Ok('x')
        }
        TokenKind::Ident(name) if name.eq_ignore_ascii_case("y") => {
            cursor.bump()?;
            Ok('y')
        }
        other => Err(AsmError::ExpectedToken {
            expected: "X or Y",
            found: describe(&other),
        }),
    }
}

fn parse_directive(name: String, cursor: &mut TokenCursor) -> Result<StatementBody, AsmError> {
    let name = name.to_lowercase();
    let mut directive = Directive {
        name,
        args: Vec::new(),
        string_arg: None,
        idents: Vec::new(),
    };

    match directive.name.as_str() {
        "macro" => {
            // macro name, then parameter names; commas are optional
            match cursor.kind().clone() {
                TokenKind::Ident(macro_name) => {
                    cursor.bump()?;
                    directive.idents.push(macro_name);
                }
                other => {
                    return Err(AsmError::ExpectedToken {
                        expected: "macro name",
                        found: describe(&other),
                    });
                }
            }
            loop {
                if *cursor.kind() == TokenKind::Comma {
                    cursor.bump()?;
                }
                match cursor.kind().clone() {
                    TokenKind::Ident(parameter) => {
                        cursor.bump()?;
                        directive.idents.push(parameter);
                    }
                    _ => break,
                }
            }
        }
        "for" => {
            match cursor.kind().clone() {
                TokenKind::Ident(variable) => {
                    cursor.bump()?;
                    directive.idents.push(variable);
                }
                other => {
                    return Err(AsmError::ExpectedToken {
                        expected: "loop variable",
                        found: describe(&other),
                    });
                }
            }
            if *cursor.kind() == TokenKind::Comma {
                cursor.bump()?;
            }
            parse_directive_args(&mut directive, cursor)?;
        }
        "zone" | "zn" => match cursor.kind().clone() {
            TokenKind::Ident(zone) => {
                cursor.bump()?;
                directive.idents.push(zone);
            }
            TokenKind::Str(bytes) => {
                cursor.bump()?;
                directive.string_arg = Some(bytes);
            }
            _ => {}
        },
        "ifdef" | "ifndef" => match cursor.kind().clone() {
            TokenKind::Ident(symbol) => {
                cursor.bump()?;
                directive.idents.push(symbol);
            }
            TokenKind::LocalIdent(symbol) => {
                cursor.bump()?;
                directive.idents.push(symbol);
            }
            other => {
                return Err(AsmError::ExpectedToken {
                    expected: "symbol name",
                    found: describe(&other),
                });
            }
        },
        "cpu" => {
            // the processor name may lex as number+identifier (65c02)
            let mut processor = String::new();
            loop {
                match cursor.kind().clone() {
                    TokenKind::Number(value) => {
                        cursor.bump()?;
                        processor.push_str(&value.to_string());
                    }
                    TokenKind::Ident(word) => {
                        cursor.bump()?;
                        processor.push_str(&word);
                    }
                    _ => break,
                }
            }
            if processor.is_empty() {
                return Err(AsmError::BadArgumentCount {
                    directive: "cpu".to_string(),
                    expected: "a processor name",
                    found: 0,
                });
            }
            directive.string_arg = Some(processor.into_bytes());
        }
        _ => parse_directive_args(&mut directive, cursor)?,
    }

    Ok(StatementBody::Directive(directive))
}

/// Comma-separated expressions; a single string literal is captured into
/// `string_arg` instead of the expression list
fn parse_directive_args(directive: &mut Directive, cursor: &mut TokenCursor) -> Result<(), AsmError> {
    loop {
        if cursor.at_line_end() {
            break;
        }
        match cursor.kind().clone() {
            TokenKind::Str(bytes) => {
                cursor.bump()?;
                directive.string_arg = Some(bytes);
            }
            _ => {
                let arg = parse_expression(cursor)?;
                directive.args.push(arg);
            }
        }
        if *cursor.kind() == TokenKind::Comma {
            cursor.bump()?;
        } else {
            break;
        }
    }
    Ok(())
}

/// Macro arguments are raw comma-separated text chunks, trimmed, with
/// commas inside string literals left alone
fn parse_macro_call(name: String, args_start: usize, text: &str) -> StatementBody {
    let rest = &text[args_start.min(text.len())..];
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut chars = rest.chars();
    for character in &mut chars {
        if in_quotes {
            current.push(character);
            if escaped {
                escaped = false;
            } else if character == '\\' {
                escaped = true;
            } else if character == '"' {
                in_quotes = false;
            }
            continue;
        }
        match character {
            ';' => break,
            '"' => {
                in_quotes = true;
                current.push(character);
            }
            ',' => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(character),
        }
    }
    let last = current.trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    StatementBody::MacroCall(MacroCall { name, args })
}

#[cfg(test)]
mod test {
    use super::*;

    fn parsed(text: &str) -> Statement {
        parse_line(text)
    }

    fn instruction(statement: &Statement) -> &Instruction {
        match &statement.body {
            StatementBody::Instruction(instruction) => instruction,
            other => panic!("expected an instruction, got {:?}", other),
        }
    }

    fn directive(statement: &Statement) -> &Directive {
        match &statement.body {
            StatementBody::Directive(directive) => directive,
            other => panic!("expected a directive, got {:?}", other),
        }
    }

    #[test]
    fn blank_and_comment_lines_are_empty_statements() {
        assert_eq!(parsed(""), Statement::default());
        assert_eq!(parsed("   ; just a comment"), Statement::default());
    }

    #[test]
    fn label_only_line() {
        let statement = parsed("start:");
        assert_eq!(
            statement.label,
            Some(Label {
                name: "start".to_string(),
                kind: LabelKind::Global
            })
        );
        assert_eq!(statement.body, StatementBody::Empty);
    }

    #[test]
    fn label_without_colon_before_instruction() {
        let statement = parsed("loop lda #0");
        assert_eq!(statement.label.as_ref().unwrap().name, "loop");
        assert_eq!(instruction(&statement).mnemonic, "lda");
    }

    #[test]
    fn local_label_attaches() {
        let statement = parsed(".inner rts");
        let label = statement.label.as_ref().unwrap();
        assert_eq!((label.name.as_str(), label.kind), (".inner", LabelKind::Local));
    }

    #[test]
    fn anonymous_labels_attach() {
        let statement = parsed("- lda $d012");
        assert_eq!(statement.label.as_ref().unwrap().kind, LabelKind::AnonBackward);
        assert_eq!(instruction(&statement).mnemonic, "lda");
        let statement = parsed("+");
        assert_eq!(statement.label.as_ref().unwrap().kind, LabelKind::AnonForward);
        assert_eq!(statement.body, StatementBody::Empty);
    }

    #[test]
    fn assignment_statement() {
        let statement = parsed("speed = $42");
        match &statement.body {
            StatementBody::Assignment(assignment) => {
                assert_eq!(assignment.name, "speed");
                assert_eq!(assignment.expr, Expr::Number(0x42));
            }
            other => panic!("expected an assignment, got {:?}", other),
        }
    }

    #[test]
    fn assignment_without_rhs_is_an_error() {
        assert!(matches!(parsed("speed =").body, StatementBody::Error(_)));
    }

    #[test]
    fn origin_shorthand_lowers_to_org() {
        let statement = parsed("*=$0801");
        let d = directive(&statement);
        assert_eq!(d.name, "org");
        assert_eq!(d.args, vec![Expr::Number(0x0801)]);
    }

    #[test]
    fn immediate_operand_shape() {
        let i = &parsed("lda #$41");
        let i = instruction(i);
        assert!(i.shape.immediate);
        assert!(i.shape.has_operand);
    }

    #[test]
    fn indexed_operand_shapes() {
        assert!(instruction(&parsed("sta $0400,x")).shape.index_x);
        assert!(instruction(&parsed("sta $0400,Y")).shape.index_y);
    }

    #[test]
    fn indirect_operand_shapes() {
        let jmp = parsed("jmp ($fffe)");
        assert!(instruction(&jmp).shape.indirect);
        let izx = parsed("and ($aa,X)");
        assert!(instruction(&izx).shape.indirect);
        assert!(instruction(&izx).shape.index_x);
        let izy = parsed("and ($bb),Y");
        assert!(instruction(&izy).shape.indirect);
        assert!(instruction(&izy).shape.index_y);
    }

    #[test]
    fn bare_a_is_accumulator_for_shifts() {
        let statement = parsed("asl a");
        let i = instruction(&statement);
        assert!(i.shape.accumulator);
        assert!(!i.shape.has_operand);
        // for other mnemonics `a` stays an ordinary symbol operand
        let statement = parsed("lda a");
        assert!(instruction(&statement).shape.has_operand);
    }

    #[test]
    fn directive_with_expression_list() {
        let statement = parsed("!byte 1, 2, 3");
        assert_eq!(directive(&statement).args.len(), 3);
    }

    #[test]
    fn directive_with_string() {
        let statement = parsed("!text \"hello\"");
        assert_eq!(
            directive(&statement).string_arg.as_deref(),
            Some(b"hello".as_slice())
        );
    }

    #[test]
    fn macro_definition_collects_name_and_parameters() {
        let statement = parsed("!macro add3 first, second, third");
        assert_eq!(
            directive(&statement).idents,
            vec!["add3", "first", "second", "third"]
        );
    }

    #[test]
    fn for_directive_keeps_variable_and_bounds() {
        let statement = parsed("!for i, 1, 3");
        let d = directive(&statement);
        assert_eq!(d.idents, vec!["i"]);
        assert_eq!(d.args.len(), 2);
    }

    #[test]
    fn cpu_directive_reassembles_the_name() {
        assert_eq!(
            directive(&parsed("!cpu 65c02")).string_arg.as_deref(),
            Some(b"65c02".as_slice())
        );
        assert_eq!(
            directive(&parsed("!cpu 6510")).string_arg.as_deref(),
            Some(b"6510".as_slice())
        );
    }

    #[test]
    fn macro_call_splits_raw_arguments() {
        let statement = parsed("+setcolor 1, \"a,b\", border+1");
        match &statement.body {
            StatementBody::MacroCall(call) => {
                assert_eq!(call.name, "setcolor");
                assert_eq!(call.args, vec!["1", "\"a,b\"", "border+1"]);
            }
            other => panic!("expected a macro call, got {:?}", other),
        }
    }

    #[test]
    fn macro_call_after_label() {
        let statement = parsed("here: +clear");
        assert_eq!(statement.label.as_ref().unwrap().name, "here");
        assert!(matches!(statement.body, StatementBody::MacroCall(_)));
    }

    #[test]
    fn unknown_leading_token_is_an_error_statement() {
        assert!(matches!(parsed("&&&").body, StatementBody::Error(_)));
    }
}
