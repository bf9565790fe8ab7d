use midipro_domain_soundfont::SoundfontRegistry;
use midipro_ports::backend::BackendError;
use midipro_ports::types::SoundfontId;
use pretty_assertions::assert_eq;

#[test]
fn handles_start_at_one_and_increase() {
    let mut registry = SoundfontRegistry::new();
    assert_eq!(registry.peek_next_id(), SoundfontId(1));

    let first = registry.insert("a.sf2");
    let second = registry.insert("b.sf2");

    assert_eq!(first, SoundfontId(1));
    assert_eq!(second, SoundfontId(2));
    assert_eq!(registry.ids(), vec![SoundfontId(1), SoundfontId(2)]);
    assert_eq!(registry.get(second), Ok(&"b.sf2"));
}

#[test]
fn removed_handles_are_not_reused() {
    let mut registry = SoundfontRegistry::new();
    let first = registry.insert("a.sf2");
    assert_eq!(registry.remove(first), Ok("a.sf2"));

    let next = registry.insert("b.sf2");
    assert_eq!(next, SoundfontId(2));
    assert!(!registry.contains(first));
}

#[test]
fn missing_handle_reports_unknown_soundfont() {
    let mut registry: SoundfontRegistry<&str> = SoundfontRegistry::new();

    assert_eq!(
        registry.get(SoundfontId(3)),
        Err(BackendError::UnknownSoundfont(SoundfontId(3)))
    );
    assert_eq!(
        registry.remove(SoundfontId(1)),
        Err(BackendError::UnknownSoundfont(SoundfontId(1)))
    );
    assert!(registry.get_mut(SoundfontId(0)).is_err());
}

#[test]
fn drain_empties_registry_and_keeps_counter() {
    let mut registry = SoundfontRegistry::new();
    registry.insert("a.sf2");
    registry.insert("b.sf2");

    let drained = registry.drain();
    assert_eq!(
        drained,
        vec![(SoundfontId(1), "a.sf2"), (SoundfontId(2), "b.sf2")]
    );
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
    assert_eq!(registry.insert("c.sf2"), SoundfontId(3));
}
