use crate::expr::Expr;
use crate::token::TokenType;

/// Renders an expression in parenthesized prefix form, e.g.
/// `(* (- 123) (group 45.67))`.  Used by the parser tests to pin down tree
/// shape and precedence.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(token) => match &token.token_type {
                TokenType::NUMBER(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.0}", n)
                    } else {
                        n.to_string()
                    }
                }

                TokenType::STRING(s) => s.clone(),

                TokenType::TRUE => "true".to_string(),

                TokenType::FALSE => "false".to_string(),

                TokenType::NULL => "null".to_string(),

                _ => token.lexeme.clone(),
            },

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Unary { op, right } => format!("({} {})", op.lexeme, self.print(right)),

            Expr::Binary { left, op, right } | Expr::Logical { left, op, right } => format!(
                "({} {} {})",
                op.lexeme,
                self.print(left),
                self.print(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call { callee, args, .. } => {
                let mut out = format!("(call {}", self.print(callee));
                for arg in args {
                    out.push(' ');
                    out.push_str(&self.print(arg));
                }
                out.push(')');
                out
            }
        }
    }
}
