use embr::{
    decode, encode, kind_for_prefix, ClinicalEntity, ClinicalRecord, Demographics, EmbrError,
    EntityDetail, EntityId, IsoDate, Period, VitalStatus,
};

fn date(s: &str) -> IsoDate {
    IsoDate::parse(s).expect("valid date")
}

fn id(s: &str) -> EntityId {
    EntityId::parse(s).expect("valid id")
}

fn loss_of_teeth() -> ClinicalEntity {
    ClinicalEntity::new(
        id("CN-9"),
        "Loss of teeth",
        "confirmed",
        Period::on(date("1980-05-14")),
        EntityDetail::Condition,
    )
}

fn emergency_admission() -> ClinicalEntity {
    ClinicalEntity::new(
        id("EN-312"),
        "Emergency room admission",
        "completed",
        Period::on(date("2017-09-24")),
        EntityDetail::Encounter { reason: None },
    )
}

#[test]
fn condition_and_encounter_survive_round_trip() {
    let record = ClinicalRecord::default()
        .with_entity(loss_of_teeth())
        .with_entity(emergency_admission());

    let text = encode(&record).expect("encode");
    let decoded = decode(&text).expect("decode");

    assert_eq!(decoded.entities.len(), 2);
    assert_eq!(decoded.entities[0], loss_of_teeth());
    assert_eq!(decoded.entities[1], emergency_admission());
    assert_eq!(decoded, record);
}

#[test]
fn duplicate_ids_are_rejected_before_encoding() {
    let mut second = loss_of_teeth();
    second.description = "Chronic pain".into();
    let record = ClinicalRecord::default()
        .with_entity(loss_of_teeth())
        .with_entity(second);

    let err = encode(&record).expect_err("duplicate id");
    assert!(matches!(&err, EmbrError::Validation { subject, .. } if subject == "CN-9"));
    assert!(err.to_string().contains("CN-9"));
}

#[test]
fn duplicate_lines_are_rejected_when_decoding() {
    let text = "[Demographics]\nstatus=alive\n[Conditions]\nCN-9|Loss of teeth|confirmed|1980-05-14\nCN-9|Loss of teeth|confirmed|1980-05-14\n";
    assert!(matches!(
        decode(text),
        Err(EmbrError::DuplicateId { id, .. }) if id == "CN-9"
    ));
}

#[test]
fn malformed_input_names_the_line() {
    let unknown_header = "[Demographics]\nstatus=alive\n[Immunizations]\n";
    assert_eq!(decode(unknown_header).expect_err("header").line(), Some(3));

    let short_line = "[Demographics]\nstatus=alive\n[Encounters]\nEN-312|Emergency room admission|completed\n";
    let err = decode(short_line).expect_err("short line");
    assert!(matches!(err, EmbrError::Format { line: 4, .. }));
}

#[test]
fn full_patient_round_trips_and_is_stable() {
    let demographics = Demographics {
        name: Some("Clair Towne".into()),
        age: Some(66),
        birth_date: Some(date("1957-05-22")),
        gender: Some("male".into()),
        race: Some("Black or African American".into()),
        ethnicity: Some("Not Hispanic or Latino".into()),
        vital_status: VitalStatus::Deceased,
        date_of_death: Some(date("2024-01-03")),
    };

    let record = ClinicalRecord::new(demographics)
        .with_entity(ClinicalEntity::new(
            id("MD-701"),
            "10 ML oxaliplatin 5 MG/ML Injection",
            "active",
            Period::on(date("2021-07-20")),
            EntityDetail::Medication,
        ))
        .with_entity(loss_of_teeth())
        .with_entity(ClinicalEntity::new(
            id("MR-60"),
            "Clopidogrel 75 MG Oral Tablet",
            "active",
            Period::on(date("2012-08-01T09:30:00+01:00")),
            EntityDetail::MedicationRequest {
                dosage: Some("75 mg | once daily".into()),
            },
        ))
        .with_entity(ClinicalEntity::new(
            id("PR-658"),
            "Partial resection of colon",
            "completed",
            Period::range(date("2021-07-09"), date("2021-07-10")),
            EntityDetail::Procedure {
                outcome: Some("No complications\nDischarged day 2".into()),
            },
        ))
        .with_entity(emergency_admission())
        .with_entity(ClinicalEntity::new(
            id("OB-12"),
            "Blood pressure",
            "final",
            Period::on(date("2023-10-04")),
            EntityDetail::Observation {
                value: "125/64".into(),
                unit: Some("mm[Hg]".into()),
            },
        ));

    let text = encode(&record).expect("encode");
    let decoded = decode(&text).expect("decode");
    assert_eq!(decoded, record.grouped());
    assert_eq!(encode(&decoded).expect("re-encode"), text);

    for entity in &decoded.entities {
        assert_eq!(kind_for_prefix(entity.id.prefix()), Some(entity.kind()));
    }
}

#[test]
fn text_at_the_field_limit_round_trips() {
    use embr::validation::MAX_FIELD_CHARS;

    let demographics = Demographics {
        name: Some("n".repeat(MAX_FIELD_CHARS)),
        gender: Some("g".repeat(MAX_FIELD_CHARS)),
        ethnicity: Some("|".repeat(MAX_FIELD_CHARS)),
        ..Demographics::default()
    };
    let record = ClinicalRecord::new(demographics).with_entity(ClinicalEntity::new(
        id("CN-9"),
        "\\".repeat(MAX_FIELD_CHARS),
        "s".repeat(MAX_FIELD_CHARS),
        Period::on(date("1980-05-14")),
        EntityDetail::Condition,
    ));

    let text = encode(&record).expect("encode at limit");
    assert_eq!(decode(&text).expect("decode at limit"), record);
}

#[test]
fn text_over_the_field_limit_is_rejected_before_encoding() {
    use embr::validation::MAX_FIELD_CHARS;

    let record = ClinicalRecord::new(Demographics {
        race: Some("r".repeat(MAX_FIELD_CHARS + 1)),
        ..Demographics::default()
    });
    let err = encode(&record).expect_err("race too long");
    assert_eq!(err.subject(), Some("demographics"));
}

#[test]
fn records_too_large_to_decode_are_not_encoded() {
    use embr::validation::{MAX_DOCUMENT_BYTES, MAX_FIELD_CHARS};

    let description = "d".repeat(MAX_FIELD_CHARS);
    let count = MAX_DOCUMENT_BYTES / MAX_FIELD_CHARS + 1;
    let record = (1..=count).fold(ClinicalRecord::default(), |record, n| {
        record.with_entity(ClinicalEntity::new(
            id(&format!("CN-{n}")),
            description.as_str(),
            "confirmed",
            Period::on(date("1980-05-14")),
            EntityDetail::Condition,
        ))
    });

    let err = encode(&record).expect_err("document too large");
    assert!(matches!(&err, EmbrError::Validation { subject, .. } if subject == "record"));
    assert!(err.to_string().contains("bytes"));
}
