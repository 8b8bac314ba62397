use activity_core::model::{ActivityKind, StudentId, SubjectId, TermId};
use activity_core::time::fixed_now;
use backend::api::{NO_ITEMS_DETAIL, PERMISSION_DENIED_DETAIL, UNKNOWN_KIND_DETAIL};
use backend::{
    ActivityBackend, FeedbackRecord, InMemoryBackend, ItemRecord, OpenSessionRequest,
    ResponseRecord,
};

fn open_request(backend: &InMemoryBackend, kind: ActivityKind, count: u32) -> OpenSessionRequest {
    OpenSessionRequest {
        student_id: StudentId::random(),
        activity_kind_id: backend.register_kind(kind),
        subject_id: SubjectId::random(),
        term_id: TermId::random(),
        topic_id: None,
        item_count: count,
        content_scope_id: None,
        device_type: "test".into(),
    }
}

fn response_for(request: &OpenSessionRequest, item: &ItemRecord) -> ResponseRecord {
    ResponseRecord {
        student_id: request.student_id,
        item_id: item.id,
        subject_id: request.subject_id,
        term_id: request.term_id,
        topic_id: None,
        microconcept_id: None,
        activity_kind_id: request.activity_kind_id,
        is_correct: true,
        duration_ms: 1200,
        attempt_number: 1,
        response_normalized: "56".into(),
        hint_used: None,
        difficulty_at_time: None,
        timestamp_start: fixed_now(),
        timestamp_end: fixed_now(),
    }
}

#[tokio::test]
async fn session_lifecycle_round_trip() {
    let backend = InMemoryBackend::with_standard_catalog();
    backend.add_items(
        ActivityKind::Quiz,
        [
            ItemRecord::choice("7 × 8?", ["54", "56"], "56"),
            ItemRecord::choice("2 + 2?", ["4", "5"], "4"),
            ItemRecord::choice("3 + 3?", ["6", "7"], "6"),
        ],
    );

    let request = open_request(&backend, ActivityKind::Quiz, 2);
    let session = backend.open_session(&request).await.unwrap();
    let items = backend.session_items(session.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].stem, "7 × 8?");

    backend
        .submit_response(session.id, &response_for(&request, &items[0]))
        .await
        .unwrap();
    backend.end_session(session.id).await.unwrap();
    assert!(backend.is_ended(session.id));

    let late = backend
        .submit_response(session.id, &response_for(&request, &items[1]))
        .await
        .unwrap_err();
    assert_eq!(late.detail(), Some("Session is not in progress"));

    let feedback = FeedbackRecord {
        rating: 4,
        text: Some("fun".into()),
    };
    backend.submit_feedback(session.id, &feedback).await.unwrap();
    assert_eq!(backend.feedback_for(session.id), Some(feedback));
    assert_eq!(backend.responses().len(), 1);
}

#[tokio::test]
async fn rejections_carry_server_details() {
    let backend = InMemoryBackend::with_standard_catalog();

    let empty = backend
        .open_session(&open_request(&backend, ActivityKind::Match, 5))
        .await
        .unwrap_err();
    assert_eq!(empty.detail(), Some(NO_ITEMS_DETAIL));

    let mut unknown = open_request(&backend, ActivityKind::Quiz, 5);
    unknown.activity_kind_id = activity_core::model::ActivityKindId::random();
    let err = backend.open_session(&unknown).await.unwrap_err();
    assert_eq!(err.detail(), Some(UNKNOWN_KIND_DETAIL));

    backend.add_items(ActivityKind::Quiz, [ItemRecord::choice("Q", ["a"], "a")]);
    backend.deny_permission(true);
    let denied = backend
        .open_session(&open_request(&backend, ActivityKind::Quiz, 5))
        .await
        .unwrap_err();
    assert_eq!(denied.detail(), Some(PERMISSION_DENIED_DETAIL));
    assert_eq!(denied.status(), Some(403));
}

#[tokio::test]
async fn feedback_requires_an_ended_session() {
    let backend = InMemoryBackend::with_standard_catalog();
    backend.add_items(ActivityKind::Quiz, [ItemRecord::choice("Q", ["a"], "a")]);
    let session = backend
        .open_session(&open_request(&backend, ActivityKind::Quiz, 1))
        .await
        .unwrap();

    let feedback = FeedbackRecord {
        rating: 5,
        text: None,
    };
    let err = backend.submit_feedback(session.id, &feedback).await.unwrap_err();
    assert_eq!(err.status(), Some(400));

    backend.end_session(session.id).await.unwrap();
    let again = backend.end_session(session.id).await.unwrap_err();
    assert_eq!(again.detail(), Some("Session already ended"));
}

#[tokio::test]
async fn demo_backend_serves_every_kind() {
    let backend = backend::demo_backend();
    for kind in ActivityKind::ALL {
        let request = open_request(&backend, kind, kind.default_item_count());
        let session = backend.open_session(&request).await.unwrap();
        let items = backend.session_items(session.id).await.unwrap();
        assert!(!items.is_empty(), "{kind} has no demo items");
        for item in items {
            assert!(item.into_item().validate_payload().is_ok());
        }
    }
}
