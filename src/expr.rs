//! Expression trees, their parser and their evaluator
//!
//! Expressions are parsed by recursive descent with one function per
//! precedence level, lowest first: `|`, `^`, `&`, comparisons, shifts,
//! additive, multiplicative, unary, primary. Anonymous-label tokens can be
//! repurposed while parsing: after a value they act as the `+`/`-`
//! operators, and before a primary a backward run acts as unary negation.
//! One sign character is peeled off the run per role.

use crate::assembler::{AsmError, Pass};
use crate::lexer::{TokenCursor, TokenKind, describe};
use crate::symbols::{AnonLabels, SymbolFlags, SymbolTable, mangle_local};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Negate,
    Complement,
    Not,
    LowByte,
    HighByte,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// An owned expression tree. Cloning is deep.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i32),
    /// Reference by name. Local names keep their leading dot; anonymous
    /// references use the synthetic names `__anon_fwd_<n>` and
    /// `__anon_back_<n>`.
    Symbol(String),
    /// The current program counter, written `*`
    Pc,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

pub const ANON_FORWARD_PREFIX: &str = "__anon_fwd_";
pub const ANON_BACKWARD_PREFIX: &str = "__anon_back_";

/// Parse one expression from the cursor, starting at the lowest
/// precedence level.
pub fn parse_expression(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    parse_bit_or(cursor)
}

fn parse_bit_or(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_bit_xor(cursor)?;
    while *cursor.kind() == TokenKind::Pipe {
        cursor.bump()?;
        let rhs = parse_bit_xor(cursor)?;
        lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_bit_xor(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_bit_and(cursor)?;
    while *cursor.kind() == TokenKind::Caret {
        cursor.bump()?;
        let rhs = parse_bit_and(cursor)?;
        lhs = Expr::Binary(BinaryOp::Xor, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_bit_and(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_comparison(cursor)?;
    while *cursor.kind() == TokenKind::Amp {
        cursor.bump()?;
        let rhs = parse_comparison(cursor)?;
        lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_comparison(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_shift(cursor)?;
    loop {
        let op = match cursor.kind() {
            TokenKind::Equals => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::LessEq => BinaryOp::Le,
            TokenKind::GreaterEq => BinaryOp::Ge,
            _ => break,
        };
        cursor.bump()?;
        let rhs = parse_shift(cursor)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_shift(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_additive(cursor)?;
    loop {
        let op = match cursor.kind() {
            TokenKind::Shl => BinaryOp::Shl,
            TokenKind::Shr => BinaryOp::Shr,
            _ => break,
        };
        cursor.bump()?;
        let rhs = parse_additive(cursor)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_additive(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_multiplicative(cursor)?;
    loop {
        let kind = cursor.kind().clone();
        let op = match kind {
            TokenKind::Plus => {
                cursor.bump()?;
                BinaryOp::Add
            }
            TokenKind::Minus => {
                cursor.bump()?;
                BinaryOp::Sub
            }
            // After a value, an anonymous run plays the operator role.
            // One sign is consumed; a longer run leaves the remainder in
            // place for the right-hand side.
            TokenKind::AnonForward(count) => {
                if count == 1 {
                    cursor.bump()?;
                } else {
                    cursor.replace_kind(TokenKind::AnonForward(count - 1));
                }
                BinaryOp::Add
            }
            TokenKind::AnonBackward(count) => {
                if count == 1 {
                    cursor.bump()?;
                } else {
                    cursor.replace_kind(TokenKind::AnonBackward(count - 1));
                }
                BinaryOp::Sub
            }
            _ => break,
        };
        let rhs = parse_multiplicative(cursor)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_multiplicative(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let mut lhs = parse_unary(cursor)?;
    loop {
        let op = match cursor.kind() {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            _ => break,
        };
        cursor.bump()?;
        let rhs = parse_unary(cursor)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn starts_primary(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number(_)
            | TokenKind::Char(_)
            | TokenKind::Ident(_)
            | TokenKind::LocalIdent(_)
            | TokenKind::Star
            | TokenKind::LParen
            | TokenKind::AnonForward(_)
            | TokenKind::AnonBackward(_)
    )
}

fn parse_unary(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let kind = cursor.kind().clone();
    let op = match kind {
        TokenKind::Minus => Some(UnaryOp::Negate),
        TokenKind::Tilde => Some(UnaryOp::Complement),
        TokenKind::Bang => Some(UnaryOp::Not),
        TokenKind::Less => Some(UnaryOp::LowByte),
        TokenKind::Greater => Some(UnaryOp::HighByte),
        // A backward run acts as unary negation, but only when a primary
        // expression actually follows it; otherwise it stays a reference.
        TokenKind::AnonBackward(count) => {
            if starts_primary(&cursor.peek_next()?.kind) {
                if count == 1 {
                    cursor.bump()?;
                } else {
                    cursor.replace_kind(TokenKind::AnonBackward(count - 1));
                }
                let inner = parse_unary(cursor)?;
                return Ok(Expr::Unary(UnaryOp::Negate, Box::new(inner)));
            }
            None
        }
        _ => None,
    };
    match op {
        Some(op) => {
            cursor.bump()?;
            let inner = parse_unary(cursor)?;
            Ok(Expr::Unary(op, Box::new(inner)))
        }
        None => parse_primary(cursor),
    }
}

fn parse_primary(cursor: &mut TokenCursor) -> Result<Expr, AsmError> {
    let expr = match cursor.kind().clone() {
        TokenKind::Number(value) => Expr::Number(value),
        TokenKind::Char(value) => Expr::Number(value as i32),
        TokenKind::Ident(name) => Expr::Symbol(name),
        TokenKind::LocalIdent(name) => Expr::Symbol(name),
        TokenKind::Star => Expr::Pc,
        TokenKind::AnonForward(count) => {
            Expr::Symbol(format!("{}{}", ANON_FORWARD_PREFIX, count))
        }
        TokenKind::AnonBackward(count) => {
            Expr::Symbol(format!("{}{}", ANON_BACKWARD_PREFIX, count))
        }
        TokenKind::LParen => {
            cursor.bump()?;
            let inner = parse_expression(cursor)?;
            if *cursor.kind() != TokenKind::RParen {
                return Err(AsmError::ExpectedToken {
                    expected: ")",
                    found: describe(cursor.kind()),
                });
            }
            cursor.bump()?;
            return Ok(inner);
        }
        other => {
            return Err(AsmError::ExpectedExpression {
                found: describe(&other),
            });
        }
    };
    cursor.bump()?;
    Ok(expr)
}

/// The outcome of evaluating an expression: its value, whether every
/// symbol in it was defined, and whether the value is known to fit in
/// zero page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalResult {
    pub value: i32,
    pub defined: bool,
    pub zeropage: bool,
}

impl EvalResult {
    fn known(value: i32) -> EvalResult {
        EvalResult {
            value,
            defined: true,
            zeropage: fits_zeropage(value),
        }
    }

    fn undefined() -> EvalResult {
        EvalResult {
            value: 0,
            defined: false,
            zeropage: false,
        }
    }
}

fn fits_zeropage(value: i32) -> bool {
    (0..=0xff).contains(&value)
}

/// Everything the evaluator needs from the driver state
pub struct EvalContext<'a> {
    pub symbols: &'a mut SymbolTable,
    pub anons: &'a mut AnonLabels,
    pub pc: i32,
    pub pass: Pass,
    pub zone: Option<&'a str>,
}

/// Evaluate an expression tree against the current driver state.
/// Arithmetic is signed 32-bit two's complement; division and modulo by
/// zero yield 0; shift-right is logical.
pub fn eval(expr: &Expr, ctx: &mut EvalContext) -> EvalResult {
    match expr {
        Expr::Number(value) => EvalResult::known(*value),
        Expr::Pc => EvalResult::known(ctx.pc),
        Expr::Symbol(name) => eval_symbol(name, ctx),
        Expr::Unary(op, inner) => {
            let inner = eval(inner, ctx);
            let (value, zeropage) = match op {
                UnaryOp::Negate => (inner.value.wrapping_neg(), None),
                UnaryOp::Complement => (!inner.value, None),
                UnaryOp::Not => ((inner.value == 0) as i32, None),
                UnaryOp::LowByte => (inner.value & 0xff, Some(true)),
                UnaryOp::HighByte => ((inner.value >> 8) & 0xff, Some(true)),
            };
            EvalResult {
                value,
                defined: inner.defined,
                zeropage: zeropage.unwrap_or_else(|| fits_zeropage(value)),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, ctx);
            let rhs = eval(rhs, ctx);
            let (l, r) = (lhs.value, rhs.value);
            let value = match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        0
                    } else {
                        l.wrapping_div(r)
                    }
                }
                BinaryOp::Mod => {
                    if r == 0 {
                        0
                    } else {
                        l.wrapping_rem(r)
                    }
                }
                BinaryOp::And => l & r,
                BinaryOp::Or => l | r,
                BinaryOp::Xor => l ^ r,
                BinaryOp::Shl => {
                    if (0..=31).contains(&r) {
                        ((l as u32) << r) as i32
                    } else {
                        0
                    }
                }
                BinaryOp::Shr => {
                    if (0..=31).contains(&r) {
                        ((l as u32) >> r) as i32
                    } else {
                        0
                    }
                }
                BinaryOp::Eq => (l == r) as i32,
                BinaryOp::Ne => (l != r) as i32,
                BinaryOp::Lt => (l < r) as i32,
                BinaryOp::Gt => (l > r) as i32,
                BinaryOp::Le => (l <= r) as i32,
                BinaryOp::Ge => (l >= r) as i32,
            };
            EvalResult {
                value,
                defined: lhs.defined && rhs.defined,
                zeropage: fits_zeropage(value),
            }
        }
    }
}

/// Find the first name in an expression that does not resolve, for
/// error messages. Unlike [`eval`], this never moves the anonymous
/// forward cursor.
pub fn first_undefined(expr: &Expr, ctx: &mut EvalContext) -> Option<String> {
    match expr {
        Expr::Number(_) | Expr::Pc => None,
        Expr::Symbol(name) => {
            if let Some(count) = name.strip_prefix(ANON_FORWARD_PREFIX) {
                let count: usize = count.parse().unwrap_or(1);
                let resolves =
                    ctx.pass == Pass::Two && ctx.anons.peek_forward(count).is_some();
                return if resolves {
                    None
                } else {
                    Some("+".repeat(count))
                };
            }
            if let Some(count) = name.strip_prefix(ANON_BACKWARD_PREFIX) {
                let count: usize = count.parse().unwrap_or(1);
                return if ctx.anons.read_backward(count).is_some() {
                    None
                } else {
                    Some("-".repeat(count))
                };
            }
            let canonical = mangle_local(name, ctx.zone);
            match ctx.symbols.lookup(&canonical) {
                Some(symbol) if symbol.flags.contains(SymbolFlags::DEFINED) => None,
                _ => Some(name.clone()),
            }
        }
        Expr::Unary(_, inner) => first_undefined(inner, ctx),
        Expr::Binary(_, lhs, rhs) => {
            first_undefined(lhs, ctx).or_else(|| first_undefined(rhs, ctx))
        }
    }
}

fn eval_symbol(name: &str, ctx: &mut EvalContext) -> EvalResult {
    if let Some(count) = name.strip_prefix(ANON_FORWARD_PREFIX) {
        let count: usize = count.parse().unwrap_or(1);
        return match ctx.pass {
            // Forward anonymous references cannot resolve until the
            // definition list is complete.
            Pass::One => EvalResult::undefined(),
            Pass::Two => match ctx.anons.read_forward(count) {
                Some(address) => EvalResult::known(address),
                None => EvalResult::undefined(),
            },
        };
    }
    if let Some(count) = name.strip_prefix(ANON_BACKWARD_PREFIX) {
        let count: usize = count.parse().unwrap_or(1);
        return match ctx.anons.read_backward(count) {
            Some(address) => EvalResult::known(address),
            None => EvalResult::undefined(),
        };
    }
    let canonical = mangle_local(name, ctx.zone);
    match ctx.symbols.touch(&canonical) {
        Some(symbol) if symbol.flags.contains(SymbolFlags::DEFINED) => EvalResult {
            value: symbol.value,
            defined: true,
            zeropage: symbol.flags.contains(SymbolFlags::ZEROPAGE)
                || fits_zeropage(symbol.value),
        },
        _ => EvalResult::undefined(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(text: &str) -> Expr {
        let mut cursor = TokenCursor::new(text).expect("lex failure");
        parse_expression(&mut cursor).expect("parse failure")
    }

    fn eval_str(text: &str) -> EvalResult {
        let mut symbols = SymbolTable::new();
        let mut anons = AnonLabels::new();
        let expr = parse(text);
        let mut ctx = EvalContext {
            symbols: &mut symbols,
            anons: &mut anons,
            pc: 0x1000,
            pass: Pass::One,
            zone: None,
        };
        eval(&expr, &mut ctx)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(eval_str("1+2*3").value, 7);
        assert_eq!(eval_str("(1+2)*3").value, 9);
    }

    #[test]
    fn shifts_bind_tighter_than_comparisons() {
        // 1 << 4 = 16, then 16 <= 16
        assert_eq!(eval_str("1 << 4 <= 16").value, 1);
    }

    #[test]
    fn bitwise_tower_is_ordered_or_xor_and() {
        // & first: 6 & 3 = 2; ^ next: 4 ^ 2 = 6; | last: 8 | 6 = 14
        assert_eq!(eval_str("8 | 4 ^ 6 & 3").value, 14);
    }

    #[test]
    fn low_and_high_byte_select_and_mark_zeropage() {
        let low = eval_str("<$1234");
        assert_eq!((low.value, low.zeropage), (0x34, true));
        let high = eval_str(">$1234");
        assert_eq!((high.value, high.zeropage), (0x12, true));
    }

    #[test]
    fn division_and_modulo_by_zero_yield_zero() {
        assert_eq!(eval_str("10/0").value, 0);
        assert_eq!(eval_str("7 & 3/0").value, 0);
    }

    #[test]
    fn shift_right_is_logical() {
        assert_eq!(eval_str("-1 >> 28").value, 0xf);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(eval_str("5 = 5").value, 1);
        assert_eq!(eval_str("5 <> 5").value, 0);
        assert_eq!(eval_str("3 < 4 & 4 > 3").value, 1);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval_str("~0").value, -1);
        assert_eq!(eval_str("!0").value, 1);
        assert_eq!(eval_str("!7").value, 0);
        assert_eq!(eval_str("-(3)").value, -3);
    }

    #[test]
    fn star_reads_the_program_counter() {
        assert_eq!(eval_str("*+2").value, 0x1002);
    }

    #[test]
    fn character_literal_is_its_byte_value() {
        assert_eq!(eval_str("'A'+1").value, 0x42);
    }

    #[test]
    fn undefined_symbol_propagates() {
        let result = eval_str("missing + 1");
        assert!(!result.defined);
        assert_eq!(result.value, 1);
    }

    #[test]
    fn defined_symbol_resolves() {
        let mut symbols = SymbolTable::new();
        let mut anons = AnonLabels::new();
        symbols.define("speed", 0x42, SymbolFlags::DEFINED);
        let expr = parse("SPEED*2");
        let mut ctx = EvalContext {
            symbols: &mut symbols,
            anons: &mut anons,
            pc: 0,
            pass: Pass::One,
            zone: None,
        };
        let result = eval(&expr, &mut ctx);
        assert_eq!((result.value, result.defined), (0x84, true));
    }

    #[test]
    fn anonymous_token_after_value_acts_as_operator() {
        // `2 - 1` lexes the minus as a backward run of one
        assert_eq!(eval_str("2 - 1").value, 1);
        assert_eq!(eval_str("2 + 1").value, 3);
    }

    #[test]
    fn backward_run_negates_when_a_primary_follows() {
        // `- 1` lexes as AnonBackward(1) then Number; unary role applies
        assert_eq!(eval_str("- 1").value, -1);
    }

    #[test]
    fn backward_reference_resolves_from_the_stack() {
        let mut symbols = SymbolTable::new();
        let mut anons = AnonLabels::new();
        anons.push_backward(0x0810, "t.asm", 1);
        anons.push_backward(0x0815, "t.asm", 2);
        let expr = parse("-");
        let mut ctx = EvalContext {
            symbols: &mut symbols,
            anons: &mut anons,
            pc: 0x0820,
            pass: Pass::One,
            zone: None,
        };
        assert_eq!(eval(&expr, &mut ctx).value, 0x0815);
        let expr = parse("--");
        let mut ctx = EvalContext {
            symbols: &mut symbols,
            anons: &mut anons,
            pc: 0x0820,
            pass: Pass::One,
            zone: None,
        };
        assert_eq!(eval(&expr, &mut ctx).value, 0x0810);
    }

    #[test]
    fn local_symbol_mangles_through_the_zone() {
        let mut symbols = SymbolTable::new();
        let mut anons = AnonLabels::new();
        symbols.define("irq.loop", 0x0900, SymbolFlags::DEFINED);
        let expr = parse(".loop");
        let mut ctx = EvalContext {
            symbols: &mut symbols,
            anons: &mut anons,
            pc: 0,
            pass: Pass::One,
            zone: Some("irq"),
        };
        assert_eq!(eval(&expr, &mut ctx).value, 0x0900);
    }
}
