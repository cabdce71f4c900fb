use coursepulse_core::db::open_db_in_memory;
use coursepulse_core::{
    CatalogService, FormationDirectory, GateError, PublicationRepoError, PublicationService,
    QuestionDraft, QuestionType, Role, SqliteCatalogRepository, SqliteFormationDirectory,
    SqlitePublicationRepository,
};
use rusqlite::Connection;

type Gate<'conn> = PublicationService<
    SqliteCatalogRepository<'conn>,
    SqliteFormationDirectory<'conn>,
    SqlitePublicationRepository<'conn>,
>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn gate(conn: &Connection) -> Gate<'_> {
    PublicationService::new(
        SqliteCatalogRepository::try_new(conn).unwrap(),
        SqliteFormationDirectory::try_new(conn).unwrap(),
        SqlitePublicationRepository::try_new(conn).unwrap(),
    )
}

/// Publishes a one-question student template and registers one formation.
fn seed_catalog(conn: &Connection, template_code: &str, formation_code: &str) {
    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap());
    let template = catalog
        .create_template(template_code, "Course evaluation", Role::Student)
        .unwrap();
    let section = catalog.add_section(template.template_uuid, "General").unwrap();
    catalog
        .add_question(
            section.section_uuid,
            QuestionDraft::new(QuestionType::Likert, "Rate the course"),
        )
        .unwrap();
    catalog.publish(template.template_uuid).unwrap();

    let directory = SqliteFormationDirectory::try_new(conn).unwrap();
    directory
        .upsert_formation(formation_code, "Computer Science BSc", true, 1_000)
        .unwrap();
}

#[test]
fn find_active_honors_inclusive_window_bounds() {
    let conn = setup();
    seed_catalog(&conn, "EVAL-W", "CS-BSC");
    let gate = gate(&conn);

    let publication = gate
        .create_publication("EVAL-W", "CS-BSC", 100, 200)
        .unwrap();

    for now in [100, 150, 200] {
        let found = gate.find_active("EVAL-W", "CS-BSC", now).unwrap();
        assert_eq!(found.publication_uuid, publication.publication_uuid);
    }
    for now in [99, 201] {
        assert!(matches!(
            gate.find_active("EVAL-W", "CS-BSC", now),
            Err(GateError::NoActivePublication { .. })
        ));
    }
}

#[test]
fn unknown_and_inactive_formations_are_not_found() {
    let conn = setup();
    seed_catalog(&conn, "EVAL-F", "CS-BSC");
    let gate = gate(&conn);
    gate.create_publication("EVAL-F", "CS-BSC", 0, 1_000).unwrap();

    assert!(matches!(
        gate.find_active("EVAL-F", "NO-SUCH", 500),
        Err(GateError::FormationNotFound(code)) if code == "NO-SUCH"
    ));

    let directory = SqliteFormationDirectory::try_new(&conn).unwrap();
    directory
        .upsert_formation("CS-BSC", "Computer Science BSc", false, 2_000)
        .unwrap();
    assert!(matches!(
        gate.find_active("EVAL-F", "CS-BSC", 500),
        Err(GateError::FormationNotFound(_))
    ));
}

#[test]
fn create_requires_published_template() {
    let conn = setup();
    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(&conn).unwrap());
    catalog
        .create_template("EVAL-DRAFT", "Unpublished", Role::Student)
        .unwrap();
    let directory = SqliteFormationDirectory::try_new(&conn).unwrap();
    directory
        .upsert_formation("CS-BSC", "Computer Science BSc", true, 1_000)
        .unwrap();

    let gate = gate(&conn);
    assert!(matches!(
        gate.create_publication("EVAL-DRAFT", "CS-BSC", 0, 100),
        Err(GateError::TemplateNotPublished(_))
    ));
    assert!(matches!(
        gate.create_publication("NO-SUCH", "CS-BSC", 0, 100),
        Err(GateError::TemplateNotFound(_))
    ));
}

#[test]
fn inverted_window_is_rejected() {
    let conn = setup();
    seed_catalog(&conn, "EVAL-INV", "CS-BSC");
    let gate = gate(&conn);

    assert!(matches!(
        gate.create_publication("EVAL-INV", "CS-BSC", 200, 100),
        Err(GateError::Publications(PublicationRepoError::InvalidWindow {
            window_start: 200,
            window_end: 100,
        }))
    ));
}

#[test]
fn overlapping_windows_resolve_to_most_recently_created() {
    let conn = setup();
    seed_catalog(&conn, "EVAL-OVL", "CS-BSC");
    let gate = gate(&conn);

    let older = gate.create_publication("EVAL-OVL", "CS-BSC", 0, 1_000).unwrap();
    let newer = gate.create_publication("EVAL-OVL", "CS-BSC", 0, 1_000).unwrap();

    // Pin distinct creation timestamps; insertion happens within one ms.
    conn.execute(
        "UPDATE publications SET created_at = 10 WHERE publication_uuid = ?1;",
        [older.publication_uuid.to_string()],
    )
    .unwrap();
    conn.execute(
        "UPDATE publications SET created_at = 20 WHERE publication_uuid = ?1;",
        [newer.publication_uuid.to_string()],
    )
    .unwrap();

    let found = gate.find_active("EVAL-OVL", "CS-BSC", 500).unwrap();
    assert_eq!(found.publication_uuid, newer.publication_uuid);
}

#[test]
fn active_questionnaire_requires_published_role_and_window() {
    let conn = setup();
    seed_catalog(&conn, "EVAL-AQ", "CS-BSC");
    let gate = gate(&conn);
    gate.create_publication("EVAL-AQ", "CS-BSC", 100, 200).unwrap();

    let tree = gate
        .active_questionnaire("EVAL-AQ", "CS-BSC", Role::Student, 150)
        .unwrap();
    assert_eq!(tree.code, "EVAL-AQ");
    assert_eq!(tree.sections.len(), 1);
    assert_eq!(tree.sections[0].questions.len(), 1);

    // Role mismatch surfaces as a missing template, not a distinct error.
    assert!(matches!(
        gate.active_questionnaire("EVAL-AQ", "CS-BSC", Role::Professional, 150),
        Err(GateError::TemplateNotFound(_))
    ));
    assert!(matches!(
        gate.active_questionnaire("EVAL-AQ", "CS-BSC", Role::Student, 300),
        Err(GateError::NoActivePublication { .. })
    ));
}
