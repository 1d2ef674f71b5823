mod common;

use common::{config, connect, ok_empty, with_catalog, Reply, ACTIVITIES_ID, PRICE_INDEX_ID};
use iproto_client::{CallSemantics, ClientError, SelectOptions, UpdateOp};
use iproto_protocol::{keys, RequestType, Value};

fn u64_field(request: &iproto_protocol::IncomingRequest, key: u8) -> Option<u64> {
    request.field(key).and_then(Value::as_u64)
}

#[tokio::test]
async fn test_space_cache_hit_avoids_round_trip() {
    let (mut client, recorded) = connect(config(), with_catalog(ok_empty)).await;
    let conn = client.connection_mut();

    assert_eq!(conn.resolve_space("activities").await.unwrap(), ACTIVITIES_ID);
    assert_eq!(recorded.count(), 1);

    assert_eq!(conn.resolve_space("activities").await.unwrap(), ACTIVITIES_ID);
    assert_eq!(recorded.count(), 1);
    assert_eq!(conn.schema().space_count(), 1);

    // Numeric ids never hit the network.
    assert_eq!(conn.resolve_space(600u32).await.unwrap(), 600);
    assert_eq!(recorded.count(), 1);

    let lookup = recorded.last();
    assert_eq!(u64_field(&lookup, keys::SPACE_ID), Some(280));
    assert_eq!(u64_field(&lookup, keys::INDEX_ID), Some(2));
}

#[tokio::test]
async fn test_index_cache_hit_avoids_round_trip() {
    let (mut client, recorded) = connect(config(), with_catalog(ok_empty)).await;

    client
        .select("activities", "price", 300, SelectOptions::new())
        .await
        .unwrap();
    assert_eq!(recorded.count(), 3);

    client
        .select("activities", "price", 301, SelectOptions::new())
        .await
        .unwrap();
    // Only the select itself goes out the second time.
    assert_eq!(recorded.count(), 4);
    let lookups = recorded
        .all()
        .iter()
        .filter(|r| matches!(u64_field(r, keys::SPACE_ID), Some(280) | Some(288)))
        .count();
    assert_eq!(lookups, 2);
    assert_eq!(client.connection().schema().index_count(), 1);
    assert_eq!(
        client.connection().schema().index(ACTIVITIES_ID, "price"),
        Some(PRICE_INDEX_ID)
    );
}

#[tokio::test]
async fn test_clear_schema_forces_lookup() {
    let (mut client, recorded) = connect(config(), with_catalog(ok_empty)).await;
    let conn = client.connection_mut();

    conn.resolve_space("activities").await.unwrap();
    conn.clear_schema();
    conn.resolve_space("activities").await.unwrap();
    assert_eq!(recorded.count(), 2);
}

#[tokio::test]
async fn test_unknown_names() {
    let (mut client, _recorded) = connect(config(), with_catalog(ok_empty)).await;

    let err = client
        .select("nothing", 0u32, (), SelectOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "cannot find space: nothing");

    let err = client
        .select("activities", "missing", (), SelectOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound { kind: "index", .. }));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_select_with_options() {
    let (mut client, recorded) = connect(
        config(),
        with_catalog(|_| {
            Reply::Data(vec![Value::Array(vec![
                Value::from(299),
                Value::from("chess"),
            ])])
        }),
    )
    .await;

    let tuples = client
        .select(
            "activities",
            "price",
            300,
            SelectOptions::new().iterator_name("LT"),
        )
        .await
        .unwrap();
    assert_eq!(tuples.len(), 1);

    // Space lookup, index lookup, then the select itself.
    assert_eq!(recorded.count(), 3);
    let select = recorded.last();
    assert_eq!(select.request_type(), Some(RequestType::Select));
    assert_eq!(u64_field(&select, keys::SPACE_ID), Some(ACTIVITIES_ID as u64));
    assert_eq!(u64_field(&select, keys::INDEX_ID), Some(PRICE_INDEX_ID as u64));
    assert_eq!(
        select.field(keys::KEY),
        Some(&Value::Array(vec![Value::from(300)]))
    );
    assert_eq!(u64_field(&select, keys::ITERATOR), Some(3));
    assert_eq!(u64_field(&select, keys::LIMIT), Some(u32::MAX as u64));
    assert_eq!(u64_field(&select, keys::OFFSET), Some(0));

    let index_lookup = &recorded.all()[1];
    assert_eq!(u64_field(index_lookup, keys::SPACE_ID), Some(288));
}

#[tokio::test]
async fn test_select_as_typed() {
    let (mut client, _recorded) = connect(config(), |_| {
        Reply::Data(vec![
            Value::Array(vec![Value::from(1), Value::from("Roxette")]),
            Value::Array(vec![Value::from(2), Value::from("Scorpions")]),
        ])
    })
    .await;

    let rows: Vec<(u32, String)> = client
        .select_as(512u32, 0u32, (), SelectOptions::new())
        .await
        .unwrap();
    assert_eq!(rows[1], (2, "Scorpions".to_string()));
}

#[tokio::test]
async fn test_insert_and_replace() {
    let (mut client, recorded) = connect(config(), |request| {
        Reply::Data(vec![request.field(keys::TUPLE).cloned().unwrap_or(Value::Nil)])
    })
    .await;

    let tuple = vec![Value::from(1), Value::from("alice")];
    let inserted = client.insert(512u32, tuple.clone()).await.unwrap();
    assert_eq!(inserted, vec![Value::Array(tuple.clone())]);
    client.replace(512u32, tuple).await.unwrap();

    let codes: Vec<_> = recorded.all().iter().map(|r| r.request_type()).collect();
    assert_eq!(
        codes,
        vec![Some(RequestType::Insert), Some(RequestType::Replace)]
    );
}

#[tokio::test]
async fn test_delete_body() {
    let (mut client, recorded) = connect(config(), ok_empty).await;
    client.delete(512u32, 7).await.unwrap();

    let delete = recorded.last();
    assert_eq!(delete.request_type(), Some(RequestType::Delete));
    assert_eq!(u64_field(&delete, keys::SPACE_ID), Some(512));
    assert_eq!(
        delete.field(keys::KEY),
        Some(&Value::Array(vec![Value::from(7)]))
    );
    assert!(delete.field(keys::INDEX_ID).is_none());
}

#[tokio::test]
async fn test_update_renumbers_fields() {
    let (mut client, recorded) = connect(config(), with_catalog(ok_empty)).await;
    let ops = [UpdateOp::assign(2, "v1"), UpdateOp::add(3, 5)];
    client
        .update("activities", 0u32, 1, &ops)
        .await
        .unwrap();

    let update = recorded.last();
    assert_eq!(update.request_type(), Some(RequestType::Update));
    let sent = update.field(keys::TUPLE).and_then(Value::as_array).unwrap();
    let positions: Vec<i64> = sent
        .iter()
        .map(|op| op.as_array().unwrap()[1].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2]);
}

#[tokio::test]
async fn test_upsert_returns_empty_result() {
    let (mut client, recorded) = connect(config(), |_| Reply::Empty).await;
    let ops = [UpdateOp::add(3, 1)];
    let tuple = vec![Value::from(1), Value::from("x"), Value::from(0)];

    let result = client.upsert(512u32, 1, &ops, tuple.clone()).await.unwrap();
    assert!(result.is_empty());

    let upsert = recorded.last();
    assert_eq!(upsert.field(keys::TUPLE), Some(&Value::Array(tuple)));
    let sent = upsert.field(keys::OPS).and_then(Value::as_array).unwrap();
    assert_eq!(sent[0].as_array().unwrap()[1].as_i64(), Some(2));
}

#[tokio::test]
async fn test_call_semantics_select_code() {
    let (mut client, recorded) = connect(config(), ok_empty).await;
    client.call("box.info", vec![]).await.unwrap();
    assert_eq!(recorded.last().code, 0x0a);

    let old = config().with_call_semantics(CallSemantics::Old);
    let (mut client, recorded) = connect(old, ok_empty).await;
    client
        .call("echo", vec![Value::from(1), Value::from("a")])
        .await
        .unwrap();
    let call = recorded.last();
    assert_eq!(call.code, 0x06);
    assert_eq!(
        call.field(keys::FUNCTION_NAME).and_then(Value::as_str),
        Some("echo")
    );
    assert_eq!(
        call.field(keys::TUPLE),
        Some(&Value::Array(vec![Value::from(1), Value::from("a")]))
    );
}

#[tokio::test]
async fn test_eval_body() {
    let (mut client, recorded) = connect(config(), |request| {
        let args = request
            .field(keys::TUPLE)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Reply::Data(args)
    })
    .await;

    let result = client
        .eval("return ...", vec![Value::from(42)])
        .await
        .unwrap();
    assert_eq!(result, vec![Value::from(42)]);
    assert_eq!(
        recorded.last().field(keys::EXPR).and_then(Value::as_str),
        Some("return ...")
    );
}
