//! Comparison expressions
//!
//! Grammar: optional whitespace, one operator (`>`, `>=`, `=`, `!=`, `<`, `<=`),
//! optional whitespace, one or more ASCII digits, optional whitespace. The whole
//! input must be consumed. Whitespace is the POSIX `[[:space:]]` class.
//!
//! Anything else is not an error to the caller: [`evaluate`] treats it as an
//! unsatisfied predicate.

use std::fmt;

/// Relational operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
}

/// Two-character operators first so `>=` is never read as `>` followed by `=`.
const OPERATORS: [(&str, Operator); 6] = [
    (">=", Operator::GreaterOrEqual),
    ("<=", Operator::LessOrEqual),
    ("!=", Operator::NotEqual),
    (">", Operator::Greater),
    ("<", Operator::Less),
    ("=", Operator::Equal),
];

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
        }
    }

    fn apply(&self, value: i64, operand: i64) -> bool {
        match self {
            Operator::Greater => value > operand,
            Operator::GreaterOrEqual => value >= operand,
            Operator::Equal => value == operand,
            Operator::NotEqual => value != operand,
            Operator::Less => value < operand,
            Operator::LessOrEqual => value <= operand,
        }
    }
}

/// Why an expression failed to parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected one of >, >=, =, !=, <, <= at offset {0}")]
    MissingOperator(usize),

    #[error("expected digits at offset {0}")]
    MissingOperand(usize),

    #[error("operand {0} is out of range")]
    OperandOutOfRange(String),

    #[error("unexpected trailing input at offset {0}")]
    TrailingInput(usize),
}

/// Parsed expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonExpr {
    pub operator: Operator,
    pub operand: i64,
}

impl ComparisonExpr {
    pub fn parse(expr: &str) -> Result<Self, ParseError> {
        let start = skip_space(expr, 0);

        let (operator, after_op) = OPERATORS
            .iter()
            .find(|(symbol, _)| expr[start..].starts_with(symbol))
            .map(|(symbol, op)| (*op, start + symbol.len()))
            .ok_or(ParseError::MissingOperator(start))?;

        let digits_start = skip_space(expr, after_op);
        let digits_len = expr[digits_start..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits_len == 0 {
            return Err(ParseError::MissingOperand(digits_start));
        }
        let digits_end = digits_start + digits_len;

        let end = skip_space(expr, digits_end);
        if end != expr.len() {
            return Err(ParseError::TrailingInput(end));
        }

        let digits = &expr[digits_start..digits_end];
        let operand = digits
            .parse::<i64>()
            .map_err(|_| ParseError::OperandOutOfRange(digits.to_string()))?;

        Ok(Self { operator, operand })
    }

    pub fn matches(&self, value: i64) -> bool {
        self.operator.apply(value, self.operand)
    }
}

impl fmt::Display for ComparisonExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.symbol(), self.operand)
    }
}

/// Evaluate `value <op> operand`; unparseable expressions evaluate to `false`
pub fn evaluate(value: i64, expr: &str) -> bool {
    match ComparisonExpr::parse(expr) {
        Ok(parsed) => parsed.matches(value),
        Err(e) => {
            tracing::debug!(expr = %expr, error = %e, "Comparison expression does not parse");
            false
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Byte offset of the first non-space at or after `from`
fn skip_space(expr: &str, from: usize) -> usize {
    from + expr.as_bytes()[from..]
        .iter()
        .take_while(|b| is_space(**b))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_match_integer_relations() {
        let operands = [0i64, 1, 5, 200];
        let values = [-1i64, 0, 1, 4, 5, 6, 199, 200, 201];

        for n in operands {
            for v in values {
                assert_eq!(evaluate(v, &format!(">{}", n)), v > n, "{} > {}", v, n);
                assert_eq!(evaluate(v, &format!(">={}", n)), v >= n, "{} >= {}", v, n);
                assert_eq!(evaluate(v, &format!("<{}", n)), v < n, "{} < {}", v, n);
                assert_eq!(evaluate(v, &format!("<={}", n)), v <= n, "{} <= {}", v, n);
                assert_eq!(evaluate(v, &format!("={}", n)), v == n, "{} = {}", v, n);
                assert_eq!(evaluate(v, &format!("!={}", n)), v != n, "{} != {}", v, n);
            }
        }
    }

    #[test]
    fn test_whitespace_around_tokens() {
        assert!(evaluate(10, "  >  5  "));
        assert!(evaluate(10, "\t>=\n10\r"));
        assert!(evaluate(5, "\x0b=\x0c5"));
    }

    #[test]
    fn test_malformed_expressions_are_false() {
        for expr in [
            "", "   ", "5", ">", ">=", "> =5", "=>5", "==5", "!5", "<>5", ">5a", ">a5", ">-5",
            ">5 6", ">5.0", "score>5", ">\u{a0}5",
        ] {
            assert!(!evaluate(10, expr), "{:?} should not match", expr);
            assert!(!evaluate(-10, expr), "{:?} should not match", expr);
            assert!(ComparisonExpr::parse(expr).is_err(), "{:?} should not parse", expr);
        }
    }

    #[test]
    fn test_parse_produces_tagged_variant() {
        let parsed = ComparisonExpr::parse(" != 42 ").unwrap();
        assert_eq!(parsed.operator, Operator::NotEqual);
        assert_eq!(parsed.operand, 42);
        assert_eq!(parsed.to_string(), "!=42");
    }

    #[test]
    fn test_parse_error_positions() {
        assert_eq!(ComparisonExpr::parse("  x"), Err(ParseError::MissingOperator(2)));
        assert_eq!(ComparisonExpr::parse("> x"), Err(ParseError::MissingOperand(2)));
        assert_eq!(ComparisonExpr::parse(">5 !"), Err(ParseError::TrailingInput(3)));
    }

    #[test]
    fn test_operand_overflow_is_false() {
        let expr = ">99999999999999999999";
        assert!(matches!(
            ComparisonExpr::parse(expr),
            Err(ParseError::OperandOutOfRange(_))
        ));
        assert!(!evaluate(i64::MAX, expr));
    }

    #[test]
    fn test_leading_zeros_accepted() {
        assert!(evaluate(7, "=007"));
    }
}
