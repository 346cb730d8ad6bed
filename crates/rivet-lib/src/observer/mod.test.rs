use super::*;

fn resolved(name: &str) -> ResolutionEvent {
    ResolutionEvent::NodeResolved {
        reference: format!("{}/1.0#abc", name),
        context: Context::Host,
        origin: "cache".to_string(),
    }
}

#[test]
fn test_recorder_keeps_arrival_order() {
    let recorder = EventRecorder::new();
    recorder.on_event(&resolved("zlib"));
    recorder.on_event(&resolved("fmt"));

    assert_eq!(recorder.events(), vec![resolved("zlib"), resolved("fmt")]);

    recorder.clear();
    assert!(recorder.events().is_empty());
}

#[test]
fn test_recorder_filters_warnings() {
    let recorder = EventRecorder::new();
    recorder.on_event(&resolved("zlib"));
    recorder.on_event(&ResolutionEvent::RemoteUnavailable {
        remote: "center".to_string(),
        reason: "timeout".to_string(),
    });

    let warnings = recorder.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(warnings[0], ResolutionEvent::RemoteUnavailable { .. }));
}

#[test]
fn test_tracing_and_null_observers_accept_every_event() {
    let events = vec![
        resolved("zlib"),
        ResolutionEvent::OverrideApplied {
            name: "zlib".to_string(),
            context: Context::Host,
            requested: "zlib/1.2".to_string(),
            forced: "zlib/1.3".to_string(),
        },
        ResolutionEvent::BinaryClassified {
            reference: "zlib/1.3#abc".to_string(),
            context: Context::Build,
            status: BinaryStatus::Download,
            remote: Some("center".to_string()),
        },
    ];
    for event in &events {
        TracingObserver.on_event(event);
        NullObserver.on_event(event);
    }
    assert!(!events[0].is_warning());
    assert!(events[1].is_warning());
}
