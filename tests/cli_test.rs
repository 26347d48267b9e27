//! CLI integration tests for the stitch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("stitch"))
}

// Helper to create a temp file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn write_bundle(dir: &TempDir, sdl: &str) -> std::path::PathBuf {
    let bundle = json!({
        "etag": "v1",
        "schemas": [{
            "metadata": { "namespace": "hr", "name": "org" },
            "schema": sdl
        }]
    });
    write_temp_file(dir, "bundle.json", &bundle.to_string())
}

const GREETING: &str = r#"
    type Query {
        greeting(name: String!): String @upperCase @stub(value: "hello {args.name}")
        secret: String @policy(namespace: "hr", name: "isAdmin") @stub(value: "s3cr3t")
    }
"#;

mod check_command {
    use super::*;

    #[test]
    fn valid_bundle() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args(["check", bundle.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn valid_bundle_json() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args(["check", bundle.to_str().unwrap(), "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#))
            .stdout(predicate::str::contains(r#""etag":"v1""#));
    }

    #[test]
    fn unknown_directive() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, "type Query { a: String @cache }");

        cmd()
            .args(["check", bundle.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("unknown directive @cache at Query.a"));
    }

    #[test]
    fn invalid_bundle_json_output() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, "type Query { a: String @cache }");

        cmd()
            .args(["check", bundle.to_str().unwrap(), "--json"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains(r#""valid":false"#));
    }

    #[test]
    fn file_not_found() {
        cmd()
            .args(["check", "/nonexistent/bundle.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn invalid_json() {
        let dir = TempDir::new().unwrap();
        let bundle = write_temp_file(&dir, "bundle.json", "not json");

        cmd()
            .args(["check", bundle.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }
}

mod print_command {
    use super::*;

    #[test]
    fn prints_merged_sdl() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args(["print", bundle.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("type Query"))
            .stdout(predicate::str::contains("directive @stub"));
    }

    #[test]
    fn print_to_output_file() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);
        let output = dir.path().join("schema.graphql");

        cmd()
            .args([
                "print",
                bundle.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("greeting"));
    }
}

mod query_command {
    use super::*;

    #[test]
    fn runs_query() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args([
                "query",
                bundle.to_str().unwrap(),
                "--query",
                r#"{ greeting(name: "ada") }"#,
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"data":{"greeting":"HELLO ADA"}}"#));
    }

    #[test]
    fn query_from_file_with_variables() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);
        let query = write_temp_file(
            &dir,
            "query.graphql",
            "query Greet($name: String!) { greeting(name: $name) }",
        );
        let variables = write_temp_file(&dir, "variables.json", r#"{"name": "grace"}"#);

        cmd()
            .args([
                "query",
                bundle.to_str().unwrap(),
                "--query",
                &format!("@{}", query.display()),
                "--variables",
                &format!("@{}", variables.display()),
                "--operation-name",
                "Greet",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("HELLO GRACE"));
    }

    #[test]
    fn policy_without_table_is_denied() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args(["query", bundle.to_str().unwrap(), "--query", "{ secret }"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""secret":null"#))
            .stdout(predicate::str::contains("POLICY_EVALUATION_ERROR"));
    }

    #[test]
    fn policy_table_allows() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);
        let policies = write_temp_file(&dir, "policies.json", r#"{"hr": {"isAdmin": true}}"#);

        cmd()
            .args([
                "query",
                bundle.to_str().unwrap(),
                "--query",
                "{ secret }",
                "--policies",
                policies.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""secret":"s3cr3t""#));
    }

    #[test]
    fn malformed_policy_table() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);
        let policies = write_temp_file(&dir, "policies.json", r#"{"hr": {"isAdmin": "yes"}}"#);

        cmd()
            .args([
                "query",
                bundle.to_str().unwrap(),
                "--query",
                "{ secret }",
                "--policies",
                policies.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("must be a boolean"));
    }

    #[test]
    fn variables_must_be_an_object() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args([
                "query",
                bundle.to_str().unwrap(),
                "--query",
                "{ secret }",
                "--variables",
                "[1, 2]",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("JSON object"));
    }

    #[test]
    fn validation_error_exits_with_one() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args(["query", bundle.to_str().unwrap(), "--query", "{ nope }", "--pretty"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("GRAPHQL_VALIDATION_FAILED"))
            .stdout(predicate::str::contains("{\n"));
    }
}

mod cli_args {
    use super::*;

    #[test]
    fn query_requires_query_flag() {
        let dir = TempDir::new().unwrap();
        let bundle = write_bundle(&dir, GREETING);

        cmd()
            .args(["query", bundle.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--query"));
    }

    #[test]
    fn help_lists_commands() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("check"))
            .stdout(predicate::str::contains("print"))
            .stdout(predicate::str::contains("query"));
    }
}
