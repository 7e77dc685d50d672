//! External tests for the reconciler: the worked example, and the
//! idempotence / growing-buffer properties over generated streams.

use chatpane::reconciler::{ChangeKind, Reconciler};
use chatpane::render::MarkdownRenderer;
use proptest::prelude::*;

fn record(role: &str, content: &str, ts: &str) -> String {
    serde_json::json!({"role": role, "content": content, "timestamp": ts}).to_string()
}

fn fresh() -> Reconciler {
    Reconciler::new(MarkdownRenderer::default())
}

#[test]
fn test_worked_example() {
    let input = concat!(
        r#"{"role":"user","content":"hi","timestamp":"2024-01-01T00:00:00.000Z"}"#,
        "\n",
        r#"{"role":"model","content":"**hi**","timestamp":"2024-01-01T00:00:00.000Z"}"#,
    );
    let mut r = fresh();
    r.reconcile(input);

    assert_eq!(r.conversation().len(), 1);
    let node = &r.conversation().nodes()[0];
    assert_eq!(node.id, "msg-2024-01-01T00-00-00-000Z");
    assert_eq!(node.content_html, "<p><strong>hi</strong></p>\n");
}

#[test]
fn test_one_good_line_one_bad_line() {
    let buf = format!("{}\n{{\"role\":\"user\",\"content\":}}\n", record("user", "ok", "t1"));
    let mut r = fresh();
    let report = r.reconcile(&buf);
    assert_eq!(r.conversation().len(), 1);
    assert_eq!(report.skipped, 1);
}

#[test]
fn test_dedup_second_content_wins() {
    let mut r = fresh();
    r.reconcile(&record("model", "first", "t1"));
    let report = r.reconcile(&format!(
        "{}\n{}",
        record("model", "first", "t1"),
        record("model", "second", "t1")
    ));
    assert_eq!(r.conversation().len(), 1);
    assert_eq!(r.conversation().nodes()[0].source, "second");
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].kind, ChangeKind::Updated);
}

#[test]
fn test_windows_line_endings() {
    let buf = format!("{}\r\n{}\r\n", record("user", "a", "t1"), record("model", "b", "t2"));
    let mut r = fresh();
    r.reconcile(&buf);
    assert_eq!(r.conversation().len(), 2);
}

fn stream_strategy() -> impl Strategy<Value = Vec<(bool, u8, String)>> {
    prop::collection::vec(
        (any::<bool>(), 0u8..4, "[ -~\n]{0,24}"),
        0..12,
    )
}

fn build_buffer(records: &[(bool, u8, String)]) -> String {
    records
        .iter()
        .map(|(is_user, ts, content)| {
            let role = if *is_user { "user" } else { "model" };
            record(role, content, &format!("2024-06-01T10:00:0{ts}.000Z"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

proptest! {
    #[test]
    fn prop_reprocessing_same_buffer_is_idempotent(records in stream_strategy()) {
        let buf = build_buffer(&records);
        let mut r = fresh();
        r.reconcile(&buf);
        let once = r.conversation().clone();
        let report = r.reconcile(&buf);

        prop_assert_eq!(r.conversation(), &once);
        prop_assert!(report.is_noop());

        let distinct: std::collections::HashSet<u8> =
            records.iter().map(|(_, ts, _)| *ts).collect();
        prop_assert_eq!(r.conversation().len(), distinct.len());
    }

    #[test]
    fn prop_growing_prefixes_converge(
        records in stream_strategy(),
        cuts in prop::collection::vec(0usize..2000, 0..10),
    ) {
        let buf = build_buffer(&records);

        let mut single = fresh();
        single.reconcile(&buf);

        let mut streamed = fresh();
        let mut points: Vec<usize> = cuts
            .iter()
            .map(|c| if buf.is_empty() { 0 } else { c % buf.len() })
            .collect();
        points.sort_unstable();
        for p in points {
            streamed.reconcile(&buf[..p]);
        }
        streamed.reconcile(&buf);

        prop_assert_eq!(streamed.conversation(), single.conversation());
    }
}
