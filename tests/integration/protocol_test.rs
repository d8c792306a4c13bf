//! Line Protocol Integration Tests
//!
//! Envelope routing, persistent namespace, output framing and loop errors.

use interactivity_runner::Session;

use super::{run_input, session_with};

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_envelope_command_result() {
    let lines = run_input("{\"command\": \"1+1\"}\n").await;
    assert_eq!(lines, vec!["2"]);
}

#[tokio::test]
async fn test_plain_text_and_markers() {
    let lines = run_input("1+1\n%%%2*3%%%\n%%% 'a' + 'b' %%%\n").await;
    assert_eq!(lines, vec!["2", "6", "ab"]);
}

#[tokio::test]
async fn test_malformed_json_is_treated_as_a_command() {
    let lines = run_input("{\"command\": \n").await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Error: "));
}

#[tokio::test]
async fn test_empty_lines_produce_no_output() {
    let lines = run_input("\n   \n%%%%%%\n{\"command\": \"\"}\n").await;
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_envelope_replaces_shared_context() {
    let input = concat!(
        r#"{"frontmatter": {"title": "Run log", "km": 5}, "context": {"notePath": "runs/mon.md"}, "command": "get_frontmatter('title')"}"#,
        "\n",
        "note_path\n",
        "frontmatter['km'] * 2\n",
        "get_frontmatter('missing', 'none set')\n",
        r#"{"command": "note_path == ''"}"#,
        "\n",
        "get_frontmatter('title', 'gone')\n",
    );
    let lines = run_input(input).await;
    assert_eq!(
        lines,
        vec!["Run log", "runs/mon.md", "10", "none set", "True", "gone"]
    );
}

#[tokio::test]
async fn test_context_names_are_read_only() {
    let lines = run_input("note_path = 'x.md'\nnote_path == ''\n").await;
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Error: "));
    assert!(lines[0].contains("read-only"));
    assert_eq!(lines[1], "True");
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_namespace_persists_between_lines() {
    let input = concat!(
        "x = 5\n",
        "x\n",
        r#"{"command": "def double(n):\n    return n * 2"}"#,
        "\n",
        "double(x)\n",
        r#"{"command": "for i in range(3):\n    x += i"}"#,
        "\n",
        "x\n",
    );
    let lines = run_input(input).await;
    assert_eq!(lines, vec!["5", "10", "8"]);
}

#[tokio::test]
async fn test_print_and_result_order() {
    let input = r#"{"command": "print('first')\nprint('second', 2, sep=': ')"}"#;
    let lines = run_input(&format!("{}\n", input)).await;
    assert_eq!(lines, vec!["first", "second: 2"]);
}

#[tokio::test]
async fn test_multiline_error_framing() {
    let lines = run_input("raise \"line1\\nline2\"\n").await;
    assert_eq!(lines, vec!["Error: line1", " >> line2"]);
}

#[tokio::test]
async fn test_multiline_result_framing() {
    let lines = run_input("'a\\nb\\nc'\n").await;
    assert_eq!(lines, vec!["a", " >> b", " >> c"]);
}

#[tokio::test]
async fn test_errors_do_not_stop_the_loop() {
    let lines = run_input("1/0\nundefined_name\n[1, 2][5]\n40 + 2\n").await;
    assert_eq!(
        lines,
        vec![
            "Error: division by zero",
            "Error: name 'undefined_name' is not defined",
            "Error: list index out of range",
            "42",
        ]
    );
}

// ============================================================================
// Loop
// ============================================================================

#[tokio::test]
async fn test_invalid_utf8_is_reported_and_skipped() {
    let (mut session, buffer) = session_with(&[]);
    let input: &[u8] = b"x = 1\n\xc3\x28\nx + 1\n";
    session.run(input).await;
    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Loop error: "));
    assert_eq!(lines[1], "2");
}

#[tokio::test]
async fn test_last_line_without_newline_runs() {
    let lines = run_input("1\n2 + 2").await;
    assert_eq!(lines, vec!["1", "4"]);
}

#[tokio::test]
async fn test_startup_banner() {
    let (mut session, buffer) = session_with(&[]);
    session.write_info().unwrap();
    let lines = buffer.lines();
    assert!(lines[0].starts_with("Interactivity runner "));
    assert_eq!(lines[1], "Available objects:");
    assert!(lines[2..].iter().all(|l| l.starts_with(" >> ")));
}

#[tokio::test]
async fn test_session_accessors() {
    let (mut session, _buffer): (Session, _) = session_with(&[]);
    session
        .handle_line(r#"{"context": {"notePath": "a/b.md"}, "command": "y = 3"}"#)
        .await
        .unwrap();
    assert_eq!(session.context().note_path(), "a/b.md");
    assert!(session.engine().global("y").is_some());
}
