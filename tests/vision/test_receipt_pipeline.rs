// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline stage tests with a stub generator

use receipt_parser::{
    pipeline::{
        decode_sequence, preprocess, run_inference, structure, ErrorKind, ParseOutcome,
        ReceiptRecord,
    },
    vision::decode_rgb_image,
};
use serde_json::json;

use crate::common::{full_receipt_ids, ids, loaded_stub, receipt_png, StubModel};

fn receipt_image() -> image::DynamicImage {
    decode_rgb_image(&receipt_png()).unwrap().0
}

#[test]
fn test_preprocess_matches_configured_size() {
    let (_dir, model) = loaded_stub(StubModel::returning(full_receipt_ids()));
    let pixels = preprocess(&model, &receipt_image()).unwrap();

    assert_eq!(pixels.shape(), &[1, 3, 32, 24]);
    assert!(pixels.iter().all(|v| (-1.0..=1.0).contains(v)));
}

#[test]
fn test_run_inference_record() {
    let (_dir, model) = loaded_stub(StubModel::returning(full_receipt_ids()));

    let outcome = run_inference(&model, &receipt_image()).unwrap();

    let ParseOutcome::Record(record) = outcome else {
        panic!("expected a record");
    };
    assert_eq!(
        record,
        ReceiptRecord {
            issuer_ruc: Some(json!("20123456789")),
            document_series: Some(json!("F001")),
            document_number: Some(json!("00012345")),
            issue_date: Some(json!("2024-03-15")),
            total: Some(json!("59.00")),
        }
    );
}

#[test]
fn test_run_inference_unparsed_keeps_cleaned_sequence() {
    let sequence = ids("<s_receipt> <s_total> 59.00 </s_total> <sep/> <s_total> 59.00 </s_total> </s>");
    let (_dir, model) = loaded_stub(StubModel::returning(sequence.clone()));

    let outcome = run_inference(&model, &receipt_image()).unwrap();

    let expected = decode_sequence(&model, &sequence).unwrap();
    assert_eq!(
        outcome,
        ParseOutcome::Unparsed {
            raw_sequence: expected
        }
    );
}

#[test]
fn test_structure_rejects_list() {
    let (_dir, model) = loaded_stub(StubModel::returning(full_receipt_ids()));

    let err = structure(&model, "<s_total>1</s_total><sep/><s_total>2</s_total>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structure);
}

#[test]
fn test_structure_accepts_nested() {
    let (_dir, model) = loaded_stub(StubModel::returning(full_receipt_ids()));

    let parsed = structure(
        &model,
        "<s_issuer_ruc>20123456789</s_issuer_ruc><s_menu><s_nm>Coffee</s_nm></s_menu>",
    )
    .unwrap();
    assert_eq!(parsed["issuer_ruc"], json!("20123456789"));
    assert_eq!(parsed["menu"], json!({"nm": "Coffee"}));
}

#[test]
fn test_run_inference_generation_error() {
    let (_dir, model) = loaded_stub(StubModel::failing("session run failed"));

    let err = run_inference(&model, &receipt_image()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Inference);
    assert!(err.to_string().contains("session run failed"));
}
