#[cfg(test)]
mod scanner_tests {
    use roxide as lox;

    use lox::error::LoxError;
    use lox::scanner::*;
    use lox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_compound_operators() {
        assert_token_sequence(
            "! != = == < <= > >= % / *",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::MODULO, "%"),
                (TokenType::SLASH, "/"),
                (TokenType::STAR, "*"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_increment_decrement_probes() {
        // The '--'/'++' probe wins over '-='/'+=' and never fuses both.
        assert_token_sequence(
            "a-- a-=1 b++ b+=1 a-b a+b",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::MINUS_MINUS, "--"),
                (TokenType::IDENTIFIER, "a"),
                (TokenType::MINUS_EQUAL, "-="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::PLUS_PLUS, "++"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::PLUS_EQUAL, "+="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::IDENTIFIER, "a"),
                (TokenType::MINUS, "-"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::IDENTIFIER, "a"),
                (TokenType::PLUS, "+"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_keywords() {
        assert_token_sequence(
            "new static break continue class fun var while for super this",
            &[
                (TokenType::NEW, "new"),
                (TokenType::STATIC, "static"),
                (TokenType::BREAK, "break"),
                (TokenType::CONTINUE, "continue"),
                (TokenType::CLASS, "class"),
                (TokenType::FUN, "fun"),
                (TokenType::VAR, "var"),
                (TokenType::WHILE, "while"),
                (TokenType::FOR, "for"),
                (TokenType::SUPER, "super"),
                (TokenType::THIS, "this"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_05_numbers() {
        let scanner = Scanner::new(b"12 12.5 1.".to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        // A trailing dot is not part of the number.
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].token_type, TokenType::NUMBER(12.0));
        assert_eq!(tokens[0].lexeme, "12");
        assert_eq!(tokens[1].lexeme, "12.5");
        assert_eq!(tokens[2].lexeme, "1");
        assert_eq!(tokens[3].token_type, TokenType::DOT);

        match tokens[1].token_type {
            TokenType::NUMBER(n) => assert_eq!(n, 12.5),
            _ => panic!("expected number token"),
        }
    }

    #[test]
    fn test_scanner_06_string_spanning_newlines() {
        let scanner = Scanner::new(b"\"line one\nline two\" x".to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "line one\nline two"),
            other => panic!("expected string token, got {:?}", other),
        }

        // The newline inside the literal still advances the line counter.
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_scanner_07_unterminated_string() {
        let scanner = Scanner::new(b"\"oops".to_vec());
        let results: Vec<_> = scanner.collect();

        assert_eq!(results.len(), 2);
        match &results[0] {
            Err(LoxError::Lex { message, .. }) => assert_eq!(message, "Unterminated string."),
            other => panic!("expected lex error, got {:?}", other),
        }

        assert!(matches!(
            results[1].as_ref().map(|t| t.token_type.clone()),
            Ok(TokenType::EOF)
        ));
    }

    #[test]
    fn test_scanner_08_comments() {
        assert_token_sequence(
            "a // rest of line\nb /* block\nstill block */ c",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::EOF, ""),
            ],
        );

        // Block comment newlines count toward the line number.
        let scanner = Scanner::new(b"/* one\ntwo */ x".to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn test_scanner_09_unexpected_chars_are_non_fatal() {
        let source = ",.$(#";
        let scanner = Scanner::new(source.as_bytes().to_vec());

        let results: Vec<_> = scanner.collect();

        // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF.
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character."),
                "Error message should contain 'Unexpected character.', got: {}",
                err
            );
        }
    }

    #[test]
    fn test_scanner_10_lexeme_fidelity() {
        // Every emitted lexeme is the exact source slice it came from.
        let source = "var answer = 6 * 7; // truth\nprint answer;";
        let scanner = Scanner::new(source.as_bytes().to_vec());

        for token in scanner.filter_map(Result::ok) {
            if token.token_type == TokenType::EOF {
                continue;
            }

            assert!(
                source.contains(&token.lexeme),
                "lexeme '{}' not found in source",
                token.lexeme
            );
        }
    }

    fn assert_token_matches(
        result: &Result<Token, LoxError>,
        expected_type: TokenType,
        expected_lexeme: &str,
    ) {
        match result {
            Ok(token) => {
                assert_eq!(
                    token.token_type, expected_type,
                    "Expected token type {:?}, got {:?}",
                    expected_type, token.token_type
                );
                assert_eq!(
                    token.lexeme, expected_lexeme,
                    "Expected lexeme '{}', got '{}'",
                    expected_lexeme, token.lexeme
                );
            }
            Err(e) => panic!("Expected token but got error: {}", e),
        }
    }
}
