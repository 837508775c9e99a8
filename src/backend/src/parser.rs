use {
    super::{
        cairo::*,
        lexer::{self, Token},
        Error, Result,
    },
    chumsky::prelude::{Parser as ChumskyParser, *},
    num_bigint::BigUint,
};

pub(super) trait Parser<'tokens, 'src: 'tokens, Output>:
    ChumskyParser<'tokens, &'tokens [Token<'src>], Output, extra::Err<Rich<'tokens, Token<'src>>>>
    + Clone
    + 'tokens
{
}
impl<
        'tokens,
        'src: 'tokens,
        Output,
        T: ChumskyParser<
                'tokens,
                &'tokens [Token<'src>],
                Output,
                extra::Err<Rich<'tokens, Token<'src>>>,
            > + Clone
            + 'tokens,
    > Parser<'tokens, 'src, Output> for T
{
}

fn name_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Name> {
    select! { Token::Ident(ident) => ident.to_owned() }
}

fn type_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Type> {
    name_parser()
        .then(just(Token::Star).or_not())
        .try_map(|(name, star), span| match (name.as_str(), star.is_some()) {
            (_, true) => Ok(Type::Pointer(name)),
            ("felt", false) => Ok(Type::Felt),
            ("Uint256", false) => Ok(Type::Uint256),
            _ => Err(Rich::custom(span, format!("unknown type `{name}`"))),
        })
}

fn param_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Param> {
    name_parser()
        .then(just(Token::Colon).ignore_then(type_parser()).or_not())
        .map(|(name, ty)| Param {
            name,
            ty: ty.unwrap_or(Type::Felt),
        })
}

fn params_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Vec<Param>> {
    param_parser().separated_by(just(Token::Comma)).collect()
}

fn expr_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Expression> {
    recursive(|expr_parser| {
        let int = select! { Token::Int(int) => int }
            .from_str::<BigUint>()
            .unwrapped()
            .map(Expression::Int);

        let name_or_struct = name_parser()
            .then(
                expr_parser
                    .clone()
                    .separated_by(just(Token::Comma))
                    .collect()
                    .delimited_by(just(Token::OpenParen), just(Token::CloseParen))
                    .or_not(),
            )
            .map(|(name, fields)| match fields {
                Some(fields) => Expression::Struct(name, fields),
                None => Expression::Name(name),
            });

        let atom = choice((
            int,
            name_or_struct,
            expr_parser.delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
        ))
        .foldl(
            just(Token::Dot).ignore_then(name_parser()).repeated(),
            |base, field| base.member(field),
        );

        let product = atom.clone().foldl(
            just(Token::Star).to(BinaryOp::Mul).then(atom).repeated(),
            |left, (op, right)| Expression::binary(op, left, right),
        );

        product.clone().foldl(
            choice([
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            ])
            .then(product)
            .repeated(),
            |left, (op, right)| Expression::binary(op, left, right),
        )
    })
}

fn call_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Call> {
    name_parser()
        .then(
            expr_parser()
                .separated_by(just(Token::Comma))
                .collect()
                .delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
        )
        .map(|(function, arguments)| Call {
            function,
            arguments,
        })
}

fn binding_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Binding> {
    choice((
        select! { Token::Ident("_") => Binding::Ignored },
        just(Token::Local)
            .ignore_then(param_parser())
            .map(Binding::Local),
        param_parser().map(Binding::Reference),
    ))
}

fn condition_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Condition> {
    expr_parser()
        .then(choice([
            just(Token::EqEq).to(true),
            just(Token::NotEq).to(false),
        ]))
        .then(expr_parser())
        .map(|((left, equal), right)| Condition { left, equal, right })
}

fn body_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Vec<Instruction>> {
    recursive(|body_parser| {
        let local = just(Token::Local)
            .ignore_then(param_parser())
            .then_ignore(just(Token::Eq))
            .then(expr_parser())
            .map(|(Param { name, ty }, value)| Instruction::Local { name, ty, value });

        let r#let = just(Token::Let)
            .ignore_then(
                binding_parser()
                    .separated_by(just(Token::Comma))
                    .collect()
                    .delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
            )
            .then_ignore(just(Token::Eq))
            .then(call_parser())
            .map(|(bindings, call)| Instruction::Let { bindings, call });

        let assert = just(Token::Assert)
            .ignore_then(expr_parser())
            .then_ignore(just(Token::Eq))
            .then(expr_parser())
            .map(|(left, right)| Instruction::Assert(left, right));

        let r#if = just(Token::If)
            .ignore_then(condition_parser())
            .then_ignore(just(Token::Colon))
            .then(body_parser.clone())
            .then(
                just(Token::Else)
                    .ignore_then(just(Token::Colon))
                    .ignore_then(body_parser.clone())
                    .or_not(),
            )
            .then_ignore(just(Token::End))
            .map(|((condition, body), else_body)| Instruction::If {
                condition,
                body,
                else_body,
            });

        let with = just(Token::With)
            .ignore_then(
                name_parser()
                    .separated_by(just(Token::Comma))
                    .at_least(1)
                    .collect(),
            )
            .then_ignore(just(Token::Colon))
            .then(body_parser)
            .then_ignore(just(Token::End))
            .map(|(names, body)| Instruction::With { names, body });

        let r#return = just(Token::Return)
            .ignore_then(
                expr_parser()
                    .separated_by(just(Token::Comma))
                    .collect()
                    .delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
            )
            .map(Instruction::Return);

        choice((
            just(Token::AllocLocals).to(Instruction::AllocLocals),
            local,
            r#let,
            assert,
            r#if,
            with,
            r#return,
            call_parser().map(Instruction::Call),
        ))
        .repeated()
        .collect()
    })
}

fn function_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Function> {
    just(Token::At)
        .ignore_then(name_parser())
        .repeated()
        .collect()
        .then_ignore(just(Token::Func))
        .then(name_parser())
        .then(
            params_parser()
                .delimited_by(just(Token::OpenBrace), just(Token::CloseBrace))
                .or_not()
                .map(Option::unwrap_or_default),
        )
        .then(params_parser().delimited_by(just(Token::OpenParen), just(Token::CloseParen)))
        .then(
            just(Token::ThinArrow)
                .ignore_then(
                    params_parser().delimited_by(just(Token::OpenParen), just(Token::CloseParen)),
                )
                .or_not()
                .map(Option::unwrap_or_default),
        )
        .then_ignore(just(Token::Colon))
        .then(body_parser())
        .then_ignore(just(Token::End))
        .map(
            |(((((decorators, name), implicits), parameters), returns), body)| Function {
                decorators,
                name,
                implicits,
                parameters,
                returns,
                body,
            },
        )
}

fn directive_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Directive> {
    just(Token::Percent)
        .ignore_then(name_parser())
        .then(name_parser().repeated().collect())
        .map(|(name, arguments)| Directive { name, arguments })
}

fn import_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Import> {
    just(Token::From)
        .ignore_then(
            name_parser()
                .separated_by(just(Token::Dot))
                .at_least(1)
                .collect::<Vec<_>>()
                .map(|path| path.join(".")),
        )
        .then_ignore(just(Token::Import))
        .then(
            name_parser()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect(),
        )
        .map(|(module, names)| Import { module, names })
}

fn program_parser<'tokens, 'src: 'tokens>() -> impl Parser<'tokens, 'src, Program> {
    directive_parser()
        .repeated()
        .collect()
        .then(import_parser().repeated().collect())
        .then(function_parser().repeated().collect())
        .then_ignore(end())
        .map(|((directives, imports), functions)| Program {
            directives,
            imports,
            functions,
        })
}

fn errors(errs: impl IntoIterator<Item = impl ToString>) -> Error {
    Error::Parse(
        errs.into_iter()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

impl TryFrom<&str> for Program {
    type Error = Error;

    fn try_from(src: &str) -> Result<Self> {
        let tokens = lexer::lexer().parse(src).into_result().map_err(errors)?;
        let program = program_parser()
            .parse(&tokens)
            .into_result()
            .map_err(errors)?;
        Ok(program)
    }
}

pub(crate) fn parse_function(src: &str) -> Result<Function> {
    let tokens = lexer::lexer().parse(src).into_result().map_err(errors)?;
    let function = function_parser()
        .then_ignore(end())
        .parse(&tokens)
        .into_result()
        .map_err(errors)?;
    Ok(function)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "
        %lang starknet
        %builtins pedersen range_check bitwise

        from starkware.cairo.common.uint256 import Uint256, uint256_add
        from starkware.cairo.common.dict_access import DictAccess

        # adds two words
        func add{range_check_ptr}(a : Uint256, b : Uint256) -> (res : Uint256):
            alloc_locals
            let (local res : Uint256, _) = uint256_add(a, b)
            return (res)
        end

        @external
        func f_external{range_check_ptr, memory_dict : DictAccess*, msize}(a : Uint256) -> (r : Uint256):
            alloc_locals
            local limbs = a.low * 2 - (a.high + 1)
            local zero : Uint256 = Uint256(0, 0)
            assert limbs = limbs
            with memory_dict, msize:
                let (r : Uint256) = add(a, zero)
            end
            if (r.low + r.high) * 1 == 0:
                return (zero)
            else:
                g()
            end
            return (r)
        end
    ";

    #[test]
    fn parses_program() {
        let program = Program::try_from(PROGRAM).unwrap();
        assert_eq!(program.directives.len(), 2);
        assert_eq!(program.directives[1].arguments, ["pedersen", "range_check", "bitwise"]);
        assert_eq!(program.imports[0].module, "starkware.cairo.common.uint256");
        assert_eq!(program.imports[0].names, ["Uint256", "uint256_add"]);
        let external = program.function("f_external").unwrap();
        assert_eq!(external.decorators, ["external"]);
        assert_eq!(
            external.implicits,
            [
                Param::new("range_check_ptr", Type::Felt),
                Param::new("memory_dict", Type::Pointer("DictAccess".to_owned())),
                Param::new("msize", Type::Felt),
            ]
        );
        assert_eq!(external.body.len(), 7);
        let Instruction::With { names, body } = &external.body[4] else {
            panic!("expected a with block in {external}");
        };
        assert_eq!(names, &["memory_dict", "msize"]);
        assert!(matches!(
            &body[..],
            [Instruction::Let { bindings, .. }]
                if bindings == &[Binding::Reference(Param::uint256("r"))]
        ));
    }

    #[test]
    fn printed_program_reparses_to_itself() {
        let program = Program::try_from(PROGRAM).unwrap();
        let printed = program.to_string();
        assert_eq!(Program::try_from(&*printed).unwrap(), program);
        assert_eq!(Program::try_from(&*printed).unwrap().to_string(), printed);
    }

    #[test]
    fn single_functions_parse() {
        let function = parse_function("func g() -> (x):\n return (1 + 2 * 3)\nend").unwrap();
        assert_eq!(function.returns, [Param::new("x", Type::Felt)]);
        assert_eq!(
            function.body,
            [Instruction::Return(vec![Expression::binary(
                BinaryOp::Add,
                Expression::int(1u8),
                Expression::binary(BinaryOp::Mul, Expression::int(2u8), Expression::int(3u8)),
            )])]
        );
    }

    #[test]
    fn rejects_malformed_programs() {
        assert!(Program::try_from("func f(:\nend").is_err());
        assert!(Program::try_from("func f():\n local x : Bogus = 1\n return ()\nend").is_err());
        assert!(Program::try_from("func f():\n if x:\n return ()\n end\nend").is_err());
        assert!(parse_function("func f():\nend\nfunc g():\nend").is_err());
    }
}
