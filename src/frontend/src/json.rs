use {
    super::{ast::*, left_aligned_word},
    anyhow::{anyhow, bail, Context},
    num_bigint::BigUint,
    serde::Deserialize,
};

#[derive(Debug, Deserialize)]
struct JsonBlock {
    statements: Vec<JsonStatement>,
}

#[derive(Debug, Deserialize)]
struct JsonName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "nodeType")]
enum JsonStatement {
    YulBlock(JsonBlock),
    YulFunctionDefinition {
        name: String,
        #[serde(default)]
        parameters: Vec<JsonName>,
        #[serde(default, rename = "returnVariables")]
        return_variables: Vec<JsonName>,
        body: JsonBlock,
    },
    YulVariableDeclaration {
        variables: Vec<JsonName>,
        value: Option<JsonExpression>,
    },
    YulAssignment {
        #[serde(rename = "variableNames")]
        variable_names: Vec<JsonName>,
        value: JsonExpression,
    },
    YulExpressionStatement {
        expression: JsonExpression,
    },
    YulIf {
        condition: JsonExpression,
        body: JsonBlock,
    },
    YulSwitch {
        expression: JsonExpression,
        cases: Vec<JsonCase>,
    },
    YulForLoop {
        pre: JsonBlock,
        condition: JsonExpression,
        post: JsonBlock,
        body: JsonBlock,
    },
    YulBreak {},
    YulContinue {},
    YulLeave {},
}

#[derive(Debug, Deserialize)]
#[serde(tag = "nodeType")]
enum JsonExpression {
    YulFunctionCall {
        #[serde(rename = "functionName")]
        function_name: JsonName,
        arguments: Vec<JsonExpression>,
    },
    YulIdentifier {
        name: String,
    },
    YulLiteral(JsonLiteral),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LiteralKind {
    Number,
    Bool,
    String,
}

#[derive(Debug, Deserialize)]
struct JsonLiteral {
    kind: LiteralKind,
    value: Option<String>,
    #[serde(rename = "hexValue")]
    hex_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonCase {
    value: JsonCaseValue,
    body: JsonBlock,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonCaseValue {
    Literal(JsonLiteral),
    Default(String),
}

fn parse_number(text: &str) -> anyhow::Result<BigUint> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(text.as_bytes(), 10),
    };
    parsed.ok_or_else(|| anyhow!("invalid number literal `{text}`"))
}

fn decode_hex(hex: &str) -> anyhow::Result<Vec<u8>> {
    if !hex.is_ascii() {
        bail!("invalid hex value `{hex}`");
    }
    if hex.len() % 2 != 0 {
        bail!("odd-length hex value `{hex}`");
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .with_context(|| format!("invalid hex value `{hex}`"))
        })
        .collect()
}

impl TryFrom<JsonLiteral> for BigUint {
    type Error = anyhow::Error;

    fn try_from(literal: JsonLiteral) -> anyhow::Result<Self> {
        match literal.kind {
            LiteralKind::Number => {
                let value = literal.value.context("number literal without a value")?;
                parse_number(&value)
            }
            LiteralKind::Bool => match literal.value.as_deref() {
                Some("true") => Ok(BigUint::from(1u8)),
                Some("false") => Ok(BigUint::from(0u8)),
                other => bail!("invalid bool literal {other:?}"),
            },
            LiteralKind::String => {
                let bytes = match (literal.hex_value, literal.value) {
                    (Some(hex), _) => decode_hex(&hex)?,
                    (None, Some(value)) => value.into_bytes(),
                    (None, None) => bail!("string literal without a value"),
                };
                left_aligned_word(&bytes)
                    .ok_or_else(|| anyhow!("string literal is longer than 32 bytes"))
            }
        }
    }
}

impl TryFrom<JsonBlock> for Block {
    type Error = anyhow::Error;

    fn try_from(block: JsonBlock) -> anyhow::Result<Self> {
        block
            .statements
            .into_iter()
            .map(Statement::try_from)
            .collect::<anyhow::Result<_>>()
            .map(Block::new)
    }
}

fn names(names: Vec<JsonName>) -> Vec<Ident> {
    names.into_iter().map(|name| name.name).collect()
}

impl TryFrom<JsonStatement> for Statement {
    type Error = anyhow::Error;

    fn try_from(statement: JsonStatement) -> anyhow::Result<Self> {
        Ok(match statement {
            JsonStatement::YulBlock(block) => Statement::Block(block.try_into()?),
            JsonStatement::YulFunctionDefinition {
                name,
                parameters,
                return_variables,
                body,
            } => Statement::FunctionDefinition(FunctionDefinition {
                body: body
                    .try_into()
                    .with_context(|| format!("in function `{name}`"))?,
                name,
                parameters: names(parameters),
                returns: names(return_variables),
            }),
            JsonStatement::YulVariableDeclaration { variables, value } => Statement::declare(
                names(variables),
                value.map(Expression::try_from).transpose()?,
            ),
            JsonStatement::YulAssignment {
                variable_names,
                value,
            } => Statement::assign(names(variable_names), value.try_into()?),
            JsonStatement::YulExpressionStatement { expression } => {
                Statement::Expression(expression.try_into()?)
            }
            JsonStatement::YulIf { condition, body } => Statement::If(If {
                condition: condition.try_into()?,
                body: body.try_into()?,
                else_body: None,
            }),
            JsonStatement::YulSwitch { expression, cases } => {
                let mut switch = Switch {
                    expression: expression.try_into()?,
                    cases: vec![],
                    default: None,
                };
                for case in cases {
                    let body = case.body.try_into()?;
                    match case.value {
                        JsonCaseValue::Literal(literal) => switch.cases.push(Case {
                            value: literal.try_into()?,
                            body,
                        }),
                        JsonCaseValue::Default(tag) if tag == "default" => {
                            if switch.default.replace(body).is_some() {
                                bail!("switch has more than one default case");
                            }
                        }
                        JsonCaseValue::Default(tag) => bail!("invalid case value `{tag}`"),
                    }
                }
                Statement::Switch(switch)
            }
            JsonStatement::YulForLoop {
                pre,
                condition,
                post,
                body,
            } => Statement::ForLoop(ForLoop {
                pre: pre.try_into()?,
                condition: condition.try_into()?,
                post: post.try_into()?,
                body: body.try_into()?,
            }),
            JsonStatement::YulBreak {} => Statement::Break,
            JsonStatement::YulContinue {} => Statement::Continue,
            JsonStatement::YulLeave {} => Statement::Leave,
        })
    }
}

impl TryFrom<JsonExpression> for Expression {
    type Error = anyhow::Error;

    fn try_from(expression: JsonExpression) -> anyhow::Result<Self> {
        Ok(match expression {
            JsonExpression::YulFunctionCall {
                function_name,
                arguments,
            } => Expression::Call(FunctionCall {
                name: function_name.name,
                arguments: arguments
                    .into_iter()
                    .map(Expression::try_from)
                    .collect::<anyhow::Result<_>>()?,
            }),
            JsonExpression::YulIdentifier { name } => Expression::Identifier(name),
            JsonExpression::YulLiteral(literal) => Expression::Literal(literal.try_into()?),
        })
    }
}

pub(super) fn parse(src: &str) -> anyhow::Result<Block> {
    let block: JsonBlock = serde_json::from_str(src).context("malformed Yul JSON AST")?;
    block.try_into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_literal_is_left_aligned() {
        let literal = JsonLiteral {
            kind: LiteralKind::String,
            value: Some("ab".to_owned()),
            hex_value: None,
        };
        let word = BigUint::try_from(literal).unwrap();
        assert_eq!(word, BigUint::from(0x6162u32) << 240);
    }

    #[test]
    fn hex_value_is_preferred() {
        let literal = JsonLiteral {
            kind: LiteralKind::String,
            value: Some("ignored".to_owned()),
            hex_value: Some("ff".to_owned()),
        };
        let word = BigUint::try_from(literal).unwrap();
        assert_eq!(word, BigUint::from(0xffu32) << 248);
    }

    #[test]
    fn non_ascii_hex_value_is_an_error() {
        let literal = JsonLiteral {
            kind: LiteralKind::String,
            value: None,
            hex_value: Some("aéb".to_owned()),
        };
        let error = BigUint::try_from(literal).unwrap_err();
        assert!(error.to_string().contains("invalid hex value"), "{error}");
        assert!(decode_hex("0g").is_err());
        assert_eq!(decode_hex("00ff").unwrap(), [0x00, 0xff]);
    }

    #[test]
    fn rejects_unknown_node_type() {
        let src = r#"{"nodeType": "YulBlock", "statements": [{"nodeType": "YulGoto"}]}"#;
        assert!(parse(src).is_err());
    }

    #[test]
    fn parses_switch_with_default() {
        let src = r#"{
            "nodeType": "YulBlock",
            "statements": [{
                "nodeType": "YulSwitch",
                "expression": {"nodeType": "YulIdentifier", "name": "x"},
                "cases": [
                    {
                        "nodeType": "YulCase",
                        "value": {"nodeType": "YulLiteral", "kind": "number", "value": "0x1", "type": ""},
                        "body": {"nodeType": "YulBlock", "statements": [{"nodeType": "YulLeave"}]}
                    },
                    {
                        "nodeType": "YulCase",
                        "value": "default",
                        "body": {"nodeType": "YulBlock", "statements": []}
                    }
                ]
            }]
        }"#;
        let block = parse(src).unwrap();
        let [Statement::Switch(switch)] = &block.statements[..] else {
            panic!("expected a single switch, got {block}");
        };
        assert_eq!(switch.cases.len(), 1);
        assert_eq!(switch.cases[0].value, BigUint::from(1u8));
        assert_eq!(switch.cases[0].body.statements, vec![Statement::Leave]);
        assert_eq!(switch.default, Some(Block::default()));
    }
}
