use coursepulse_core::db::open_db_in_memory;
use coursepulse_core::{
    overall_statistics, overall_statistics_with_cancel, publication_statistics,
    publication_statistics_with_cancel, AnswerInput, CancelToken, CatalogService,
    FormationDirectory, PublicationId, PublicationService, QuestionDraft, QuestionId,
    QuestionType, Role, SqliteCatalogRepository, SqliteFormationDirectory,
    SqlitePublicationRepository, SqliteSubmissionRepository, StatsError, SubmissionService,
    SubmitRequest,
};
use rusqlite::Connection;
use uuid::Uuid;

const TEMPLATE_CODE: &str = "EVAL-STATS";
const FORMATION_CODE: &str = "CS-BSC";

struct Fixture {
    publication_uuid: PublicationId,
    rating: QuestionId,
    recommend: QuestionId,
    remarks: QuestionId,
}

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn seed(conn: &Connection) -> Fixture {
    let catalog = CatalogService::new(SqliteCatalogRepository::try_new(conn).unwrap());
    let template = catalog
        .create_template(TEMPLATE_CODE, "Course evaluation", Role::Student)
        .unwrap();

    let teaching = catalog
        .add_section(template.template_uuid, "Teaching")
        .unwrap();
    let rating = catalog
        .add_question(
            teaching.section_uuid,
            QuestionDraft::new(QuestionType::Likert, "Rate the course"),
        )
        .unwrap();
    let recommend = catalog
        .add_question(
            teaching.section_uuid,
            QuestionDraft::new(QuestionType::Binary, "Would you recommend it?"),
        )
        .unwrap();

    let feedback = catalog
        .add_section(template.template_uuid, "Feedback")
        .unwrap();
    let remarks = catalog
        .add_question(
            feedback.section_uuid,
            QuestionDraft::new(QuestionType::Text, "Remarks"),
        )
        .unwrap();

    catalog.publish(template.template_uuid).unwrap();

    SqliteFormationDirectory::try_new(conn)
        .unwrap()
        .upsert_formation(FORMATION_CODE, "Computer Science BSc", true, 1_000)
        .unwrap();

    let gate = PublicationService::new(
        SqliteCatalogRepository::try_new(conn).unwrap(),
        SqliteFormationDirectory::try_new(conn).unwrap(),
        SqlitePublicationRepository::try_new(conn).unwrap(),
    );
    let publication = gate
        .create_publication(TEMPLATE_CODE, FORMATION_CODE, 0, 10_000)
        .unwrap();

    Fixture {
        publication_uuid: publication.publication_uuid,
        rating: rating.question_uuid,
        recommend: recommend.question_uuid,
        remarks: remarks.question_uuid,
    }
}

fn submit(conn: &Connection, respondent_id: Uuid, answers: Vec<AnswerInput>, finalize: bool) {
    let engine = SubmissionService::new(
        SqliteCatalogRepository::try_new(conn).unwrap(),
        SqliteFormationDirectory::try_new(conn).unwrap(),
        SqlitePublicationRepository::try_new(conn).unwrap(),
        SqliteSubmissionRepository::try_new(conn).unwrap(),
    );
    engine
        .submit(&SubmitRequest {
            template_code: TEMPLATE_CODE.to_string(),
            formation_code: FORMATION_CODE.to_string(),
            respondent_id,
            respondent_role: Role::Student,
            answers,
            finalize,
            now_epoch_ms: 500,
        })
        .unwrap();
}

/// Fixed respondent ids whose ascending order matches submission order, so
/// text collection order is deterministic even within one timestamp ms.
fn respondent(index: u32) -> Uuid {
    Uuid::parse_str(&format!("00000000-0000-4000-8000-0000000000{index:02}")).unwrap()
}

fn find_question<'a>(
    stats: &'a coursepulse_core::PublicationStatistics,
    question_uuid: QuestionId,
) -> &'a coursepulse_core::QuestionStatistics {
    stats
        .sections
        .iter()
        .flat_map(|section| section.questions.iter())
        .find(|question| question.question_uuid == question_uuid)
        .expect("question should be present in statistics")
}

#[test]
fn likert_average_and_distribution_over_five_submissions() {
    let conn = setup();
    let fixture = seed(&conn);

    for value in 1..=5 {
        submit(
            &conn,
            respondent(value as u32),
            vec![AnswerInput::number(fixture.rating, value)],
            true,
        );
    }

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    assert_eq!(stats.total_submissions, 5);

    let rating = find_question(&stats, fixture.rating);
    assert_eq!(rating.total_answers, 5);
    assert_eq!(rating.average_score, Some(3.0));
    assert_eq!(rating.answer_distribution.len(), 5);

    let values: Vec<i64> = rating
        .answer_distribution
        .iter()
        .map(|bucket| bucket.value)
        .collect();
    assert_eq!(values, [1, 2, 3, 4, 5]);

    let percentage_sum: f64 = rating
        .answer_distribution
        .iter()
        .map(|bucket| bucket.percentage)
        .sum();
    assert!((percentage_sum - 100.0).abs() < 1e-9);
}

#[test]
fn binary_distribution_three_to_one() {
    let conn = setup();
    let fixture = seed(&conn);

    for index in 1..=3 {
        submit(
            &conn,
            respondent(index),
            vec![AnswerInput::number(fixture.recommend, 1)],
            true,
        );
    }
    submit(
        &conn,
        respondent(4),
        vec![AnswerInput::number(fixture.recommend, 0)],
        true,
    );

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    let recommend = find_question(&stats, fixture.recommend);

    assert_eq!(recommend.average_score, None);
    assert_eq!(recommend.answer_distribution.len(), 2);

    let negative = &recommend.answer_distribution[0];
    assert_eq!(negative.value, 0);
    assert_eq!(negative.label, "No");
    assert_eq!(negative.count, 1);
    assert!((negative.percentage - 25.0).abs() < 1e-9);

    let affirmative = &recommend.answer_distribution[1];
    assert_eq!(affirmative.value, 1);
    assert_eq!(affirmative.label, "Yes");
    assert_eq!(affirmative.count, 3);
    assert!((affirmative.percentage - 75.0).abs() < 1e-9);
}

#[test]
fn text_answers_collected_in_submission_order_excluding_blanks() {
    let conn = setup();
    let fixture = seed(&conn);

    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::text(fixture.remarks, "A")],
        true,
    );
    submit(
        &conn,
        respondent(2),
        vec![AnswerInput::text(fixture.remarks, "   ")],
        true,
    );
    submit(
        &conn,
        respondent(3),
        vec![AnswerInput::text(fixture.remarks, "B")],
        true,
    );

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    let remarks = find_question(&stats, fixture.remarks);

    // Blank strings are stored (they count as answers) but excluded from
    // the collected list.
    assert_eq!(remarks.total_answers, 3);
    assert_eq!(remarks.text_answers, ["A", "B"]);
    assert!(remarks.answer_distribution.is_empty());
    assert_eq!(remarks.average_score, None);
}

#[test]
fn end_to_end_two_student_scenario() {
    let conn = setup();
    let fixture = seed(&conn);

    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::number(fixture.rating, 4)],
        true,
    );
    submit(
        &conn,
        respondent(2),
        vec![AnswerInput::number(fixture.rating, 2)],
        true,
    );

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    assert_eq!(stats.total_submissions, 2);

    let rating = find_question(&stats, fixture.rating);
    assert_eq!(rating.average_score, Some(3.0));
    assert_eq!(rating.answer_distribution.len(), 2);
    assert_eq!(rating.answer_distribution[0].value, 2);
    assert_eq!(rating.answer_distribution[0].count, 1);
    assert!((rating.answer_distribution[0].percentage - 50.0).abs() < 1e-9);
    assert_eq!(rating.answer_distribution[1].value, 4);
    assert_eq!(rating.answer_distribution[1].count, 1);
    assert!((rating.answer_distribution[1].percentage - 50.0).abs() < 1e-9);
}

#[test]
fn sections_carry_title_and_order_in_rollup() {
    let conn = setup();
    let fixture = seed(&conn);

    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::number(fixture.rating, 5)],
        true,
    );

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    assert_eq!(stats.sections.len(), 2);
    assert_eq!(stats.sections[0].title, "Teaching");
    assert_eq!(stats.sections[0].display_order, 0);
    assert_eq!(stats.sections[0].questions.len(), 2);
    assert_eq!(stats.sections[1].title, "Feedback");
    assert_eq!(stats.sections[1].display_order, 1);
    assert_eq!(stats.sections[1].questions.len(), 1);
}

#[test]
fn publication_with_no_submissions_yields_zero_filled_stats() {
    let conn = setup();
    let fixture = seed(&conn);

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    assert_eq!(stats.total_submissions, 0);
    assert_eq!(stats.completion_rate, 0.0);

    let rating = find_question(&stats, fixture.rating);
    assert_eq!(rating.total_answers, 0);
    assert_eq!(rating.average_score, None);
    assert!(rating.answer_distribution.is_empty());
}

#[test]
fn unknown_publication_is_not_found() {
    let conn = setup();
    seed(&conn);

    assert!(matches!(
        publication_statistics(&conn, Uuid::new_v4()),
        Err(StatsError::PublicationNotFound(_))
    ));
}

#[test]
fn draft_submissions_count_only_toward_completion_rate() {
    let conn = setup();
    let fixture = seed(&conn);

    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::number(fixture.rating, 4)],
        true,
    );
    // Draft save: merged but never finalized.
    submit(
        &conn,
        respondent(2),
        vec![AnswerInput::number(fixture.rating, 1)],
        false,
    );

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    assert_eq!(stats.total_submissions, 1);
    assert!((stats.completion_rate - 50.0).abs() < 1e-9);

    // Draft answers stay out of question statistics.
    let rating = find_question(&stats, fixture.rating);
    assert_eq!(rating.total_answers, 1);
    assert_eq!(rating.average_score, Some(4.0));
}

#[test]
fn overall_statistics_on_empty_store_is_zero_filled() {
    let conn = setup();

    let stats = overall_statistics(&conn).unwrap();
    assert_eq!(stats.total_questionnaires, 0);
    assert_eq!(stats.total_submissions, 0);
    assert_eq!(stats.overall_completion_rate, 0.0);
    assert!(stats.per_formation.is_empty());
}

#[test]
fn overall_statistics_aggregates_per_formation() {
    let conn = setup();
    let fixture = seed(&conn);

    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::number(fixture.rating, 5)],
        true,
    );
    submit(
        &conn,
        respondent(2),
        vec![AnswerInput::number(fixture.rating, 3)],
        true,
    );
    submit(
        &conn,
        respondent(3),
        vec![AnswerInput::number(fixture.rating, 1)],
        false,
    );

    let stats = overall_statistics(&conn).unwrap();
    assert_eq!(stats.total_questionnaires, 1);
    assert_eq!(stats.total_submissions, 3);
    let expected_rate = 2.0 / 3.0 * 100.0;
    assert!((stats.overall_completion_rate - expected_rate).abs() < 1e-9);

    assert_eq!(stats.per_formation.len(), 1);
    let formation = &stats.per_formation[0];
    assert_eq!(formation.code, FORMATION_CODE);
    assert_eq!(formation.title, "Computer Science BSc");
    assert_eq!(formation.submission_count, 3);
    // Mean of completed Likert values only: (5 + 3) / 2.
    assert_eq!(formation.average_rating, Some(4.0));
}

#[test]
fn formation_without_likert_data_has_no_average_rating() {
    let conn = setup();
    let fixture = seed(&conn);

    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::text(fixture.remarks, "fine")],
        true,
    );

    let stats = overall_statistics(&conn).unwrap();
    assert_eq!(stats.per_formation[0].average_rating, None);
}

#[test]
fn cancelled_token_aborts_aggregation() {
    let conn = setup();
    let fixture = seed(&conn);
    submit(
        &conn,
        respondent(1),
        vec![AnswerInput::number(fixture.rating, 3)],
        true,
    );

    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(
        publication_statistics_with_cancel(&conn, fixture.publication_uuid, &cancel),
        Err(StatsError::Cancelled)
    ));
    assert!(matches!(
        overall_statistics_with_cancel(&conn, &cancel),
        Err(StatsError::Cancelled)
    ));
}

#[test]
fn statistics_serialize_in_reporting_wire_shape() {
    let conn = setup();
    let fixture = seed(&conn);
    submit(
        &conn,
        respondent(1),
        vec![
            AnswerInput::number(fixture.rating, 4),
            AnswerInput::text(fixture.remarks, "solid"),
        ],
        true,
    );

    let stats = publication_statistics(&conn, fixture.publication_uuid).unwrap();
    let json = serde_json::to_value(&stats).unwrap();

    assert!(json.get("totalSubmissions").is_some());
    assert!(json.get("completionRate").is_some());
    let question = &json["sections"][0]["questions"][0];
    assert_eq!(question["type"], "likert");
    assert!(question.get("totalAnswers").is_some());
    assert!(question.get("averageScore").is_some());
    assert!(question.get("answerDistribution").is_some());
    assert!(question.get("textAnswers").is_some());
    let bucket = &question["answerDistribution"][0];
    assert!(bucket.get("percentage").is_some());

    let overall = serde_json::to_value(overall_statistics(&conn).unwrap()).unwrap();
    assert!(overall.get("totalQuestionnaires").is_some());
    assert!(overall.get("overallCompletionRate").is_some());
    let breakdown = &overall["perFormation"][0];
    assert!(breakdown.get("submissionCount").is_some());
    assert!(breakdown.get("averageRating").is_some());
}
