//! Library-level tests: documents in either version render identically.

use cmdline::assemble::{CancelToken, assemble};
use cmdline::core::expression::RuntimeContext;
use cmdline::core::oracle::StructuralOracle;
use cmdline::core::render::Engine;
use cmdline::core::value::JobValue;
use cmdline::io::document::decode_tool;
use cmdline::io::expression::TemplateEvaluator;
use serde_json::json;

async fn render(tool: serde_json::Value, job: serde_json::Value) -> String {
    let tool = decode_tool(&tool).expect("decode");
    let evaluator = TemplateEvaluator::default();
    let engine = Engine::new(&evaluator, &StructuralOracle);
    assemble(
        &tool,
        &JobValue::from(job),
        &engine,
        RuntimeContext::default(),
        &CancelToken::never(),
    )
    .await
    .command_line
}

#[tokio::test]
async fn draft2_and_v1_render_the_same_command() {
    let job = json!({
        "input": {"class": "File", "path": "/data/in.bam"},
        "threads": 2
    });

    let v1 = render(
        json!({
            "cwlVersion": "v1.0",
            "baseCommand": ["samtools", "sort"],
            "inputs": [
                {"id": "input", "type": "File", "inputBinding": {"position": 2}},
                {"id": "threads", "type": "int", "inputBinding": {"prefix": "-@", "position": 1}}
            ],
            "arguments": [{
                "prefix": "-o",
                "valueFrom": "$(inputs.input.path).sorted",
                "position": 3
            }]
        }),
        job.clone(),
    )
    .await;

    let draft2 = render(
        json!({
            "cwlVersion": "sbg:draft-2",
            "baseCommand": ["samtools", "sort"],
            "inputs": [
                {"id": "#input", "type": ["File"], "inputBinding": {"position": 2}},
                {
                    "id": "#threads",
                    "type": ["null", "int"],
                    "inputBinding": {"prefix": "-@", "position": 1}
                }
            ],
            "arguments": [{
                "prefix": "-o",
                "position": 3,
                "valueFrom": {
                    "class": "Expression",
                    "engine": "#cwl-js-engine",
                    "script": "$job.inputs.input.path + '.sorted'"
                }
            }]
        }),
        job,
    )
    .await;

    assert_eq!(v1, "samtools sort -@ 2 /data/in.bam -o /data/in.bam.sorted");
    assert_eq!(draft2, v1);
}

#[tokio::test]
async fn record_fields_render_in_declared_order() {
    let command = render(
        json!({
            "baseCommand": "plot",
            "inputs": [{
                "id": "range",
                "type": {
                    "type": "record",
                    "fields": [
                        {"name": "from", "type": "int", "inputBinding": {"prefix": "--from"}},
                        {"name": "to", "type": "int", "inputBinding": {"prefix": "--to"}}
                    ]
                },
                "inputBinding": {"position": 1}
            }]
        }),
        json!({"range": {"to": 9, "from": 3}}),
    )
    .await;
    assert_eq!(command, "plot --from 3 --to 9");
}
