/// Conversions between session frames and the two wire encodings
use crate::error::SessionError;
use crate::request::{MutationRequest, SearchRequest};
use crate::transport::ResponseFrame;
use rogue_core::{Expression, TypedOperand, WireOperand};
use rogue_proto as proto;
use serde_json::{json, Map, Value as JsonValue};

pub fn expression_to_proto(expression: &Expression) -> proto::Expression {
    let kind = match expression {
        Expression::Basic(basic) => proto::expression::Kind::Basic(proto::Basic {
            logical_operator: proto::LogicalOperator::from(basic.logical_operator()) as i32,
            comparisons: basic
                .comparisons()
                .iter()
                .map(|pair| proto::ComparisonOperator::from(pair.operator) as i32)
                .collect(),
            operands: basic.comparisons().iter().map(|pair| pair.operand.to_any()).collect(),
            fields: basic.fields().to_vec(),
        }),
        Expression::Composite(composite) => proto::expression::Kind::Composite(proto::Composite {
            logical_operator: proto::LogicalOperator::from(composite.logical_operator()) as i32,
            expressions: composite.children().iter().map(expression_to_proto).collect(),
        }),
    };
    proto::Expression { kind: Some(kind) }
}

pub fn mutation_to_proto(request: &MutationRequest, api_key: &str) -> proto::Mutation {
    proto::Mutation {
        api_key: api_key.to_string(),
        messages: request.messages.iter().map(TypedOperand::to_any).collect(),
    }
}

pub fn search_to_proto(request: &SearchRequest, api_key: &str) -> proto::Search {
    proto::Search {
        api_key: api_key.to_string(),
        queries: request.queries.iter().map(expression_to_proto).collect(),
    }
}

/// Server map order is unspecified; buckets are sorted by query index
pub fn response_from_proto(response: proto::Response) -> ResponseFrame {
    let mut results: Vec<(u32, Vec<WireOperand>)> = response
        .results
        .into_iter()
        .map(|(query, bucket)| {
            (
                query,
                bucket.messages.into_iter().map(WireOperand::Binary).collect(),
            )
        })
        .collect();
    results.sort_by_key(|(query, _)| *query);

    ResponseFrame {
        results,
        finished: response.finished,
    }
}

pub fn expression_to_json(expression: &Expression) -> JsonValue {
    match expression {
        Expression::Basic(basic) => {
            let mut body = Map::new();
            body.insert(
                "logical_operator".to_string(),
                JsonValue::from(basic.logical_operator().as_str()),
            );
            body.insert(
                "comparisons".to_string(),
                basic
                    .comparisons()
                    .iter()
                    .map(|pair| JsonValue::from(pair.operator.as_str()))
                    .collect(),
            );
            body.insert(
                "operands".to_string(),
                basic.comparisons().iter().map(|pair| pair.operand.to_json()).collect(),
            );
            if !basic.fields().is_empty() {
                body.insert("fields".to_string(), JsonValue::from(basic.fields().to_vec()));
            }
            json!({ "basic": body })
        }
        Expression::Composite(composite) => json!({
            "composite": {
                "logical_operator": composite.logical_operator().as_str(),
                "expressions": composite.children().iter().map(expression_to_json).collect::<Vec<_>>(),
            }
        }),
    }
}

pub fn mutation_to_json(messages: &[TypedOperand], api_key: &str) -> JsonValue {
    json!({
        "api_key": api_key,
        "messages": messages.iter().map(TypedOperand::to_json).collect::<Vec<_>>(),
    })
}

pub fn search_to_json(queries: &[Expression], api_key: &str) -> JsonValue {
    json!({
        "api_key": api_key,
        "queries": queries.iter().map(expression_to_json).collect::<Vec<_>>(),
    })
}

pub fn subscribe_to_json(schemas: &[String], api_key: &str) -> JsonValue {
    json!({
        "api_key": api_key,
        "schemas": schemas,
    })
}

/// Parse a REST search response
///
/// `results` maps query indices (as object keys) to either an array of
/// operand envelopes or `{"messages": [...]}`. A missing `results` member
/// means no matches.
pub fn response_from_json(body: &JsonValue) -> Result<ResponseFrame, SessionError> {
    let malformed = |detail: String| SessionError::Transport(format!("malformed search response: {}", detail));

    let object = body
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    let mut results = Vec::new();
    if let Some(buckets) = object.get("results").filter(|v| !v.is_null()) {
        let buckets = buckets
            .as_object()
            .ok_or_else(|| malformed("results must be an object".to_string()))?;
        for (key, bucket) in buckets {
            let query: u32 = key
                .parse()
                .map_err(|_| malformed(format!("query index '{}' is not a number", key)))?;
            let items = match bucket {
                JsonValue::Array(items) => items,
                JsonValue::Object(inner) => match inner.get("messages") {
                    Some(JsonValue::Array(items)) => items,
                    Some(_) => return Err(malformed(format!("bucket {} messages must be an array", query))),
                    None => {
                        results.push((query, Vec::new()));
                        continue;
                    }
                },
                _ => return Err(malformed(format!("bucket {} must be an array or object", query))),
            };
            results.push((query, items.iter().cloned().map(WireOperand::Json).collect()));
        }
    }
    results.sort_by_key(|(query, _)| *query);

    let finished = match object.get("finished") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| malformed(format!("finished entry {} is not a query index", v)))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(ResponseFrame { results, finished })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rogue_core::{AuthToken, ComparisonOperator, LogicalOperator};

    fn test_operand(a1: i64) -> TypedOperand {
        TypedOperand::new("rogue.services.Test").with(1, "attribute1", a1)
    }

    fn scan() -> Expression {
        Expression::basic(LogicalOperator::And)
            .compare(ComparisonOperator::Lesser, test_operand(1))
            .compare(ComparisonOperator::NotEqual, test_operand(10))
            .field(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_basic_expression_to_proto() {
        let proto::Expression { kind } = expression_to_proto(&scan());
        let Some(proto::expression::Kind::Basic(basic)) = kind else {
            panic!("expected basic");
        };
        assert_eq!(basic.logical_operator, proto::LogicalOperator::And as i32);
        assert_eq!(
            basic.comparisons,
            vec![
                proto::ComparisonOperator::Lesser as i32,
                proto::ComparisonOperator::NotEqual as i32
            ]
        );
        assert_eq!(basic.operands.len(), 2);
        assert_eq!(basic.operands[0].type_url, "type.googleapis.com/rogue.services.Test");
        assert_eq!(basic.fields, vec![1]);
    }

    #[test]
    fn test_composite_to_json() {
        let composite = Expression::composite(LogicalOperator::Or)
            .child(scan())
            .build()
            .unwrap();

        assert_eq!(
            expression_to_json(&composite),
            json!({
                "composite": {
                    "logical_operator": "OR",
                    "expressions": [{
                        "basic": {
                            "logical_operator": "AND",
                            "comparisons": ["LESSER", "NOT_EQUAL"],
                            "operands": [
                                {"@type": "type.googleapis.com/rogue.services.Test", "attribute1": 1},
                                {"@type": "type.googleapis.com/rogue.services.Test", "attribute1": 10}
                            ],
                            "fields": [1]
                        }
                    }]
                }
            })
        );
    }

    #[test]
    fn test_mutation_envelopes_carry_api_key() {
        let request = MutationRequest {
            kind: crate::request::MutationKind::Insert,
            token: AuthToken::new("t"),
            messages: vec![test_operand(10)],
        };
        let wire = mutation_to_proto(&request, "key");
        assert_eq!(wire.api_key, "key");
        assert_eq!(wire.messages.len(), 1);

        let body = mutation_to_json(&request.messages, "key");
        assert_eq!(body["api_key"], "key");
        assert_eq!(body["messages"][0]["attribute1"], 10);
    }

    #[test]
    fn test_proto_response_sorted_by_index() {
        let mut response = proto::Response::default();
        response.results.insert(3, proto::QueryResult::default());
        response.results.insert(
            1,
            proto::QueryResult {
                messages: vec![test_operand(1).to_any()],
            },
        );
        response.finished = vec![1];

        let frame = response_from_proto(response);
        let order: Vec<u32> = frame.results.iter().map(|(q, _)| *q).collect();
        assert_eq!(order, vec![1, 3]);
        assert_eq!(frame.results[0].1.len(), 1);
        assert_eq!(frame.finished, vec![1]);
    }

    #[test]
    fn test_json_response_bucket_shapes() {
        let frame = response_from_json(&json!({
            "results": {
                "1": {"messages": [{"@type": "type.googleapis.com/rogue.services.Test", "attribute1": 2}]},
                "0": [{"@type": "type.googleapis.com/rogue.services.Test", "attribute1": 1}],
                "2": {}
            },
            "finished": [0, 1, 2]
        }))
        .unwrap();

        assert_eq!(frame.results.len(), 3);
        assert_eq!(frame.results[0].0, 0);
        assert_eq!(frame.results[1].1.len(), 1);
        assert!(frame.results[2].1.is_empty());
        assert_eq!(frame.finished, vec![0, 1, 2]);

        assert!(response_from_json(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_json_response_rejects_bad_index() {
        let err = response_from_json(&json!({"results": {"first": []}})).unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
