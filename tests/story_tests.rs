/// Story integration tests: navigation, checkpoints, save/restore and errors
/// against the lighthouse fixture.

use passage_engine::{
    ErrorKind, MemoryHost, Phase, SaveData, Story, StoryData, StoryError, StoryEvent, StoryState,
};
use serde_json::json;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

fn fixture() -> StoryData {
    StoryData::load_from_ron(Path::new("tests/fixtures/lighthouse.ron")).unwrap()
}

fn story_with(host: MemoryHost) -> Story<MemoryHost> {
    Story::builder(fixture()).seed(42).build(host).unwrap()
}

fn story() -> Story<MemoryHost> {
    story_with(MemoryHost::new())
}

/// Record every event name the story emits.
fn record(story: &mut Story<MemoryHost>) -> Rc<RefCell<Vec<StoryEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    story.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

fn names(events: &Rc<RefCell<Vec<StoryEvent>>>) -> Vec<String> {
    events.borrow().iter().map(|e| e.name().to_string()).collect()
}

fn frame_histories(story: &Story<MemoryHost>) -> Vec<Option<Vec<u32>>> {
    story
        .host()
        .frames
        .iter()
        .map(|f| f.as_ref().map(|f| f.history.clone()))
        .collect()
}

#[test]
fn fixture_loads_document_fields() {
    let story = story();
    assert_eq!(story.name(), "The Lighthouse");
    assert_eq!(story.start_passage(), 1);
    assert_eq!(story.creator(), "Twine");
    assert_eq!(story.creator_version(), "2.6.2");
    assert_eq!(story.passages().len(), 7);
    assert!(story.passage("Shore").unwrap().has_tag("outdoors"));
    assert_eq!(story.passage(6).unwrap().source, "Sea spray & grit.");
    assert_eq!(story.phase(), Phase::Idle);
}

#[test]
fn start_runs_styles_scripts_and_shows_start_passage() {
    let mut story = story();
    let events = record(&mut story);
    story.start().unwrap();

    assert_eq!(story.host().styles, vec!["tw-passage { font-family: serif; }"]);
    assert_eq!(story.state().get("has_match"), Some(&json!(false)));
    assert_eq!(story.state().get("name"), Some(&json!("Keeper <3")));
    assert_eq!(story.history(), &[1]);
    assert!(story.at_checkpoint());
    assert_eq!(story.host().passage_name(), Some("Shore"));

    let html = story.host().html().unwrap();
    assert!(html.starts_with("You stand on the shore. "));
    assert!(html.contains("<a href=\"javascript:void(0)\" data-passage=\"Path\">Climb</a>"));
    assert!(html.contains("data-passage=\"Salt &amp; Pepper\""));

    // The failing second script is reported and play goes on.
    let recorded = events.borrow();
    assert!(recorded.iter().any(|e| matches!(
        e,
        StoryEvent::Error { kind: ErrorKind::UserScript, .. }
    )));
    assert!(story.host().error_screen.is_none());
    assert_eq!(
        names(&events)
            .into_iter()
            .filter(|n| n != "error")
            .collect::<Vec<_>>(),
        vec![
            "story:started",
            "story:hidden",
            "story:showing",
            "checkpoint:added",
            "story:shown"
        ]
    );
}

#[test]
fn checkpoint_opens_a_new_frame_and_plain_shows_replace() {
    let mut story = story();
    story.show(1, false).unwrap();
    story.checkpoint(None);
    story.show(2, false).unwrap();
    story.show(3, false).unwrap();

    assert_eq!(story.history(), &[1, 2, 3]);
    assert_eq!(
        frame_histories(&story),
        vec![Some(vec![1]), Some(vec![1, 2, 3])]
    );
}

#[test]
fn show_of_missing_passage_changes_nothing() {
    let mut story = story();
    story.start().unwrap();
    let history = story.history().to_vec();
    let state = story.state().clone();
    let events = record(&mut story);

    let err = story.show(999, false).unwrap_err();
    assert!(matches!(err, StoryError::Navigation(_)));
    assert_eq!(err.kind(), ErrorKind::Navigation);
    assert_eq!(story.history(), history.as_slice());
    assert_eq!(story.state(), &state);
    assert!(events.borrow().is_empty());
}

#[test]
fn name_lookup_is_case_insensitive_and_links_unescape() {
    let mut story = story();
    story.start().unwrap();
    story.activate_link("PATH").unwrap();
    assert_eq!(story.current().map(|p| p.id), Some(2));

    story.activate_link("Salt &amp; Pepper").unwrap();
    assert_eq!(story.host().html(), Some("Sea spray &amp; grit."));
    assert_eq!(story.history(), &[1, 2, 6]);
}

#[test]
fn extended_links_and_templates_render_against_state() {
    let mut story = story();
    story.start().unwrap();
    story.activate_link("Path").unwrap();
    story.activate_link("Shore").unwrap();
    story.activate_link("Path").unwrap();
    assert_eq!(story.state().get("steps"), Some(&json!(2)));

    let html = story.host().html().unwrap();
    assert!(html.contains(
        "<a href=\"javascript:void(0)\" data-passage=\"Door\" id=\"door\" class=\"big\">Door</a>"
    ));
    assert!(html.contains("data-passage=\"Shore\">Back to the shore</a>"));

    story.activate_link("Door").unwrap();
    story.activate_link("Lamp Room").unwrap();
    assert_eq!(story.host().html(), Some("It is dark. Visits: 1"));

    story.state_mut().set("has_match", true);
    story.show("Lamp Room", false).unwrap();
    assert_eq!(story.host().html(), Some("The lamp blazes. Visits: 2"));
}

#[test]
fn passage_checkpoints_set_title_and_push_next_frame() {
    let mut story = story();
    let events = record(&mut story);
    story.start().unwrap();
    story.activate_link("Path").unwrap();
    story.activate_link("Door").unwrap();

    assert_eq!(story.checkpoint_name(), "At the door");
    assert_eq!(story.host().title.as_deref(), Some("The Lighthouse: At the door"));
    assert!(story.at_checkpoint());
    assert!(names(&events).contains(&"checkpoint:adding".to_string()));

    story.activate_link("Lamp Room").unwrap();
    assert_eq!(
        frame_histories(&story),
        vec![
            Some(vec![1]),
            Some(vec![1, 2, 3]),
            Some(vec![1, 2, 3, 4])
        ]
    );
}

#[test]
fn back_navigation_restores_frames_then_resets() {
    let mut story = story();
    story.start().unwrap();
    story.activate_link("Path").unwrap();
    story.activate_link("Door").unwrap();
    story.activate_link("Lamp Room").unwrap();

    let frame = story.host_mut().back().unwrap();
    story.pop_state(frame).unwrap();
    assert_eq!(story.history(), &[1, 2, 3]);
    assert_eq!(story.current().map(|p| p.name.as_str()), Some("Door"));
    assert_eq!(story.host().frames.len(), 2);

    // A frameless entry with real history behind it resets the session.
    story.pop_state(None).unwrap();
    assert!(story.history().is_empty());
    assert!(story.state().is_empty());
    assert_eq!(story.checkpoint_name(), "");
    assert_eq!(story.current().map(|p| p.id), Some(1));

    // With no history there is nothing to undo.
    story.pop_state(None).unwrap();
    assert_eq!(story.current().map(|p| p.id), Some(1));
}

#[test]
fn save_then_resume_from_location_hash() {
    let mut story = story();
    story.start().unwrap();
    story.activate_link("Path").unwrap();
    story.state_mut().set("inventory", json!(["rope"]));
    let token = story.save().unwrap();
    assert_eq!(story.host().hash.as_deref(), Some(token.as_str()));
    assert_eq!(story.save_hash().unwrap(), token);

    let mut resumed = story_with(MemoryHost::with_hash(token));
    let events = record(&mut resumed);
    resumed.start().unwrap();

    assert_eq!(resumed.history(), &[1, 2]);
    assert_eq!(resumed.state().get("steps"), Some(&json!(2)));
    assert_eq!(resumed.state().get("inventory"), Some(&json!(["rope"])));
    assert_eq!(resumed.current().map(|p| p.id), Some(2));
    assert!(names(&events).contains(&"restore:success".to_string()));
    // Resuming shows without writing history.
    assert_eq!(resumed.host().frames, vec![None]);
}

#[test]
fn bad_location_hash_falls_back_to_fresh_start() {
    let mut story = story_with(MemoryHost::with_hash("definitely-not-a-save"));
    let events = record(&mut story);
    story.start().unwrap();

    assert_eq!(story.history(), &[1]);
    assert!(names(&events).contains(&"restore:error".to_string()));
    assert!(!names(&events).contains(&"restore:success".to_string()));
}

#[test]
fn restore_validates_before_committing() {
    let mut story = story();
    story.start().unwrap();
    let before = story.snapshot();

    let mut state = StoryState::new();
    state.set("gold", 99);
    let bogus = SaveData {
        state,
        history: vec![1, 42],
        checkpoint_name: "Nowhere".to_string(),
    };
    let err = story.restore(&bogus.encode().unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(story.snapshot(), before);

    let empty = SaveData::default().encode().unwrap();
    assert!(story.hash_changed(&format!("#{empty}")).is_err());
    assert_eq!(story.snapshot(), before);
}

#[test]
fn template_failure_is_reported_and_playable() {
    let mut story = story();
    let events = record(&mut story);
    story.start().unwrap();
    story.show("Broken", false).unwrap();

    assert_eq!(story.host().html(), Some(""));
    assert!(story.host().error_screen.is_none());
    assert!(events.borrow().iter().any(|e| matches!(
        e,
        StoryEvent::Error { kind: ErrorKind::Render, .. }
    )));
    story.activate_link("Shore").unwrap();
}

#[test]
fn render_embeds_without_navigation() {
    let mut story = story();
    story.start().unwrap();
    let html = story.render("Postcard").unwrap();
    assert!(html.starts_with("Keeper &lt;3 writes: You stand on the shore."));
    assert_eq!(story.history(), &[1]);
    assert_eq!(story.current().map(|p| p.id), Some(1));

    assert!(story.render(999).is_err());
}

#[test]
fn unrecovered_errors_replace_display_unless_ignored() {
    let mut story = story();
    story.start().unwrap();
    assert!(story.activate_link("Attic").is_err());
    assert_eq!(
        story.host().error_screen.as_deref(),
        Some("In link activation: NavigationError: There is no passage with the ID or name \"Attic\"")
    );

    let mut quiet = Story::builder(fixture())
        .ignore_errors(true)
        .build(MemoryHost::new())
        .unwrap();
    quiet.start().unwrap();
    assert!(quiet.activate_link("Attic").is_err());
    assert!(quiet.host().error_screen.is_none());
    assert!(quiet.error_message().contains("Attic"));
}

#[test]
fn denied_history_writes_are_reported_not_fatal() {
    let host = MemoryHost {
        deny_history: true,
        ..MemoryHost::default()
    };
    let mut story = story_with(host);
    let events = record(&mut story);
    story.start().unwrap();

    assert_eq!(story.history(), &[1]);
    assert_eq!(story.host().passage_name(), Some("Shore"));
    assert!(names(&events).contains(&"checkpoint:error".to_string()));
    assert!(!names(&events).contains(&"checkpoint:added".to_string()));
}

#[test]
fn visit_queries_on_the_story() {
    let mut story = story();
    story.start().unwrap();
    story.activate_link("Path").unwrap();
    story.activate_link("Shore").unwrap();
    assert_eq!(story.visits("shore"), 2);
    assert!(story.visited(2));
    assert!(!story.visited("Door"));
    assert_eq!(story.visits("Attic"), 0);
}
