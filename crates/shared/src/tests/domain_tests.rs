use super::*;
use serde_json::json;

fn ann() -> Student {
    Student {
        id: RecordId::new("-Nabc"),
        name: "Ann".into(),
        age: 20,
        roll_no: 1,
        subjects: BTreeSet::from([Subject::Mathematics]),
    }
}

#[test]
fn student_uses_camel_case_wire_names() {
    let value = serde_json::to_value(ann()).expect("serialize");
    assert_eq!(
        value,
        json!({
            "id": "-Nabc",
            "name": "Ann",
            "age": 20,
            "rollNo": 1,
            "subjects": ["Mathematics"],
        })
    );
}

#[test]
fn fields_accept_numeric_strings_from_form_input() {
    let fields: StudentFields = serde_json::from_value(json!({
        "name": "Bob",
        "age": "21",
        "rollNo": " 17 ",
        "subjects": ["Computer Science", "Physics"],
    }))
    .expect("lenient decode");

    assert_eq!(fields.age, 21);
    assert_eq!(fields.roll_no, 17);
    assert!(fields.subjects.contains(&Subject::ComputerScience));
}

#[test]
fn fields_reject_non_numeric_age() {
    let err = serde_json::from_value::<StudentFields>(json!({
        "name": "Bob",
        "age": "twenty",
        "rollNo": 3,
        "subjects": ["English"],
    }))
    .expect_err("should fail");
    assert!(err.to_string().contains("twenty"));
}

#[test]
fn patch_serializes_only_present_fields() {
    let patch = StudentPatch {
        roll_no: Some(2),
        ..StudentPatch::default()
    };
    assert_eq!(serde_json::to_value(&patch).expect("json"), json!({ "rollNo": 2 }));

    let decoded: StudentPatch = serde_json::from_value(json!({ "age": "30" })).expect("decode");
    assert_eq!(decoded.age, Some(30));
    assert!(decoded.name.is_none());
    assert!(!decoded.is_empty());
    assert!(StudentPatch::default().is_empty());
}

#[test]
fn apply_patch_keeps_omitted_fields() {
    let mut student = ann();
    student.apply(&StudentPatch {
        roll_no: Some(2),
        ..StudentPatch::default()
    });
    assert_eq!(student.roll_no, 2);
    assert_eq!(student.name, "Ann");
    assert_eq!(student.age, 20);
}

#[test]
fn subject_parsing_is_case_insensitive() {
    assert_eq!("computer science".parse::<Subject>(), Ok(Subject::ComputerScience));
    assert_eq!(" BIOLOGY ".parse::<Subject>(), Ok(Subject::Biology));
    assert_eq!(
        "Astrology".parse::<Subject>(),
        Err(UnknownSubject("Astrology".into()))
    );
    assert_eq!(Subject::ALL.len(), 10);
}

#[test]
fn subjects_deduplicate_on_decode() {
    let fields: StudentFields = serde_json::from_value(json!({
        "name": "Cy",
        "age": 9,
        "rollNo": 4,
        "subjects": ["History", "History"],
    }))
    .expect("decode");
    assert_eq!(fields.subjects.len(), 1);
}
