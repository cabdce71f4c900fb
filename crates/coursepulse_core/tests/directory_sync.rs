use coursepulse_core::db::open_db_in_memory;
use coursepulse_core::{
    apply_directory_events, CatalogService, DirectoryEvent, FormationDirectory, GateError,
    PublicationService, QuestionDraft, QuestionType, Role, SqliteCatalogRepository,
    SqliteFormationDirectory, SqlitePublicationRepository,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn event(code: &str, title: &str, is_active: bool, occurred_at: i64) -> DirectoryEvent {
    DirectoryEvent {
        code: code.to_string(),
        title: title.to_string(),
        is_active,
        occurred_at,
    }
}

#[test]
fn events_insert_then_update_by_code() {
    let conn = setup();
    let directory = SqliteFormationDirectory::try_new(&conn).unwrap();

    let report = apply_directory_events(
        &directory,
        &[
            event("CS-BSC", "Computer Science BSc", true, 1_000),
            event("MATH-MSC", "Mathematics MSc", true, 1_000),
        ],
    )
    .unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 0);

    let report = apply_directory_events(
        &directory,
        &[event("CS-BSC", "Computer Science BSc (renamed)", true, 2_000)],
    )
    .unwrap();
    assert_eq!(report.applied, 1);

    let formation = directory.find_by_code("CS-BSC").unwrap().unwrap();
    assert_eq!(formation.title, "Computer Science BSc (renamed)");
    assert_eq!(formation.synced_at, 2_000);
}

#[test]
fn reapplying_the_same_batch_is_idempotent() {
    let conn = setup();
    let directory = SqliteFormationDirectory::try_new(&conn).unwrap();

    let batch = [event("CS-BSC", "Computer Science BSc", true, 1_000)];
    apply_directory_events(&directory, &batch).unwrap();
    apply_directory_events(&directory, &batch).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM formations;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn invalid_codes_are_skipped_without_failing_the_batch() {
    let conn = setup();
    let directory = SqliteFormationDirectory::try_new(&conn).unwrap();

    let report = apply_directory_events(
        &directory,
        &[
            event("bad code", "Lowercase with space", true, 1_000),
            event("CS-BSC", "Computer Science BSc", true, 1_000),
        ],
    )
    .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 1);
    assert!(directory.find_by_code("CS-BSC").unwrap().is_some());
}

#[test]
fn deactivation_event_hides_formation_from_the_gate() {
    let conn = setup();
    let directory = SqliteFormationDirectory::try_new(&conn).unwrap();
    apply_directory_events(
        &directory,
        &[event("CS-BSC", "Computer Science BSc", true, 1_000)],
    )
    .unwrap();

    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(&conn).unwrap());
    let template = catalog
        .create_template("EVAL-SYNC", "Evaluation", Role::Student)
        .unwrap();
    let section = catalog.add_section(template.template_uuid, "S").unwrap();
    catalog
        .add_question(
            section.section_uuid,
            QuestionDraft::new(QuestionType::Likert, "Q"),
        )
        .unwrap();
    catalog.publish(template.template_uuid).unwrap();

    let gate = PublicationService::new(
        SqliteCatalogRepository::try_new(&conn).unwrap(),
        SqliteFormationDirectory::try_new(&conn).unwrap(),
        SqlitePublicationRepository::try_new(&conn).unwrap(),
    );
    gate.create_publication("EVAL-SYNC", "CS-BSC", 0, 1_000)
        .unwrap();
    gate.find_active("EVAL-SYNC", "CS-BSC", 500).unwrap();

    apply_directory_events(
        &directory,
        &[event("CS-BSC", "Computer Science BSc", false, 2_000)],
    )
    .unwrap();

    assert!(matches!(
        gate.find_active("EVAL-SYNC", "CS-BSC", 500),
        Err(GateError::FormationNotFound(_))
    ));

    // Reactivation restores visibility; the publication itself never moved.
    apply_directory_events(
        &directory,
        &[event("CS-BSC", "Computer Science BSc", true, 3_000)],
    )
    .unwrap();
    gate.find_active("EVAL-SYNC", "CS-BSC", 500).unwrap();
}
