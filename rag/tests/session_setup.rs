mod support;

use rag::{CancelToken, RagError, Session, SessionStatus};
use support::{docs, settings, ScriptedApi};

fn prefix_ok(status: SessionStatus) -> bool {
    let flags = [status.index_ready, status.assistant_ready, status.conversation_ready];
    // once a flag is false, none after it may be true
    flags.windows(2).all(|w| w[0] || !w[1])
}

#[test]
fn successful_setup_sets_all_three_handles() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));

    session
        .setup(&api, docs(), &CancelToken::new())
        .expect("setup should succeed");

    let status = session.status();
    assert!(status.is_ready());
    assert_eq!(status.files_uploaded, 2);
    assert_eq!(
        api.calls().iter().filter(|c| **c == "upload_file").count(),
        2
    );
    assert!(api.calls().contains(&"get_file_batch"));
}

#[test]
fn every_failure_point_leaves_a_strict_prefix() {
    let cases = [
        ("create_index", [false, false, false]),
        ("upload_file", [false, false, false]),
        ("attach_files", [false, false, false]),
        ("get_file_batch", [false, false, false]),
        ("create_assistant", [true, false, false]),
        ("create_conversation", [true, true, false]),
    ];

    for (op, expected) in cases {
        let api = ScriptedApi::new();
        api.fail_on(op);
        let mut session = Session::new(settings(false));

        let err = session
            .setup(&api, docs(), &CancelToken::new())
            .expect_err("setup should fail");
        assert!(matches!(err, RagError::Status { status: 500, .. }), "{op}: {err}");

        let status = session.status();
        assert!(prefix_ok(status), "{op}: {status:?}");
        assert_eq!(
            [status.index_ready, status.assistant_ready, status.conversation_ready],
            expected,
            "{op}"
        );
        assert!(!status.is_ready());
    }
}

#[test]
fn failed_indexing_batch_is_reported_and_index_discarded() {
    let api = ScriptedApi::new();
    api.set_batch_status("failed");
    let mut session = Session::new(settings(true));

    let err = session
        .setup(&api, docs(), &CancelToken::new())
        .expect_err("failed batch should abort setup");

    assert!(matches!(err, RagError::IndexingFailed(ref s) if s == "failed"));
    assert_eq!(session.status(), SessionStatus::default());
    let deleted = api.deleted();
    assert_eq!(deleted.len(), 3);
    assert_eq!(deleted.iter().filter(|h| h.starts_with("vs_")).count(), 1);
    assert_eq!(deleted.iter().filter(|h| h.starts_with("file_")).count(), 2);
    assert!(!api.calls().contains(&"create_assistant"));
}

#[test]
fn empty_selection_is_rejected_without_remote_calls() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));

    let err = session
        .setup(&api, Vec::new(), &CancelToken::new())
        .expect_err("no documents");

    assert!(matches!(err, RagError::NoDocuments));
    assert!(api.calls().is_empty());
}

#[test]
fn assistant_requires_an_index() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));

    let err = session
        .provision_assistant(&api)
        .expect_err("index is not set");

    assert!(matches!(err, RagError::NotReady("index")));
    assert!(api.calls().is_empty());
}

#[test]
fn rerunning_setup_tears_down_previous_objects() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));
    session.setup(&api, docs(), &CancelToken::new()).expect("first setup");
    let old = [
        session.index().expect("index").to_string(),
        session.assistant().expect("assistant").to_string(),
        session.conversation().expect("conversation").to_string(),
    ];

    session.setup(&api, docs(), &CancelToken::new()).expect("second setup");

    let deleted = api.deleted();
    for handle in &old {
        assert!(deleted.contains(handle), "{handle} should be deleted");
    }
    assert_ne!(session.index().expect("index").to_string(), old[0]);
    assert!(session.status().is_ready());
}

#[test]
fn rerunning_setup_without_teardown_abandons_old_objects() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(false));
    session.setup(&api, docs(), &CancelToken::new()).expect("first setup");
    let old_index = session.index().expect("index").clone();

    api.fail_on("create_index");
    session
        .setup(&api, docs(), &CancelToken::new())
        .expect_err("second setup fails");

    assert!(api.deleted().is_empty());
    assert_eq!(session.status(), SessionStatus::default());
    assert_ne!(session.index(), Some(&old_index));
}

#[test]
fn cancelling_during_indexing_aborts_setup() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = session
        .setup(&api, docs(), &cancel)
        .expect_err("cancelled");

    assert!(matches!(err, RagError::Cancelled));
    assert!(!session.status().index_ready);
    assert!(!api.calls().contains(&"get_file_batch"));
}

#[test]
fn teardown_deletes_uploaded_files_too() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));
    session.setup(&api, docs(), &CancelToken::new()).expect("setup");

    session.teardown(&api);

    let deleted = api.deleted();
    assert_eq!(deleted.iter().filter(|h| h.starts_with("file_")).count(), 2);
    assert!(deleted.iter().any(|h| h.starts_with("vs_")));
    assert!(deleted.iter().any(|h| h.starts_with("asst_")));
    assert!(deleted.iter().any(|h| h.starts_with("thread_")));
    assert_eq!(session.status(), SessionStatus::default());

    session.teardown(&api);
    assert_eq!(api.deleted().len(), deleted.len());
}

#[test]
fn files_uploaded_before_a_failed_attach_are_deleted() {
    let api = ScriptedApi::new();
    api.fail_on("attach_files");
    let mut session = Session::new(settings(true));

    session
        .setup(&api, docs(), &CancelToken::new())
        .expect_err("attach fails");

    let deleted = api.deleted();
    assert_eq!(deleted.iter().filter(|h| h.starts_with("file_")).count(), 2);
    assert_eq!(session.status().files_uploaded, 0);
}

#[test]
fn resetup_deletes_the_previous_files() {
    let api = ScriptedApi::new();
    let mut session = Session::new(settings(true));
    session.setup(&api, docs(), &CancelToken::new()).expect("first setup");
    session.setup(&api, docs(), &CancelToken::new()).expect("second setup");

    assert_eq!(
        api.deleted().iter().filter(|h| h.starts_with("file_")).count(),
        2
    );
    assert_eq!(session.status().files_uploaded, 2);
}
