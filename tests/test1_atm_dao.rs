#![cfg(feature = "sqlite")]

use std::collections::HashMap;

use sql_mapper::prelude::*;

sql_mapper::record! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Atm {
        pub aname: String,
        pub apassword: String,
        pub abalance: f64,
    }
}

sql_mapper::sql_mapper! {
    #[derive(Debug, Clone)]
    pub struct AtmDao {
        #[insert("insert into atm values(#{aname},#{apassword},#{abalance})")]
        fn insert(atm: Atm);
        #[delete("delete from atm where aname=#{aname}")]
        fn delete(aname: &str);
        #[update("update atm set aname=#{aname},apassword=#{apassword},abalance=#{abalance} WHERE aname=#{aname}")]
        fn update(atm: Atm);
        #[select("select * from atm where aname=#{aname}")]
        fn select_one(aname: &str) -> Atm;
        #[select("select * from atm where aname=#{aname}")]
        fn find(aname: &str) -> Option<Atm>;
        #[select("select * from atm order by aname")]
        fn select_list() -> Vec<Atm>;
        #[select("select count(*) from atm")]
        fn count() -> i64;
        #[select("select aname, abalance from atm where abalance >= #{min} order by aname")]
        fn rich(min: HashMap<String, SqlValue>) -> Vec<HashMap<String, SqlValue>>;
        #[delete("delete from atm")]
        fn clear() -> usize;
    }
}

async fn setup(dir: &tempfile::TempDir) -> Result<AtmDao, SqlMapperError> {
    let path = dir.path().join("atm.db");
    let session = Session::connect(&PoolConfig::sqlite(path.to_str().unwrap(), 3, 2)).await?;
    session
        .execute_batch(
            "create table atm (aname text primary key, apassword text not null, abalance real not null);",
        )
        .await?;
    AtmDao::new(session)
}

fn atm(name: &str, password: &str, balance: f64) -> Atm {
    Atm {
        aname: name.into(),
        apassword: password.into(),
        abalance: balance,
    }
}

#[tokio::test]
async fn crud_through_generated_dao() -> Result<(), SqlMapperError> {
    let dir = tempfile::tempdir().unwrap();
    let dao = setup(&dir).await?;

    dao.insert(atm("mal", "123", 50.0)).await?;
    dao.insert(atm("zoe", "456", 120.5)).await?;
    dao.insert(atm("kaylee", "789", 7.25)).await?;

    let mal = dao.select_one("mal").await?;
    assert_eq!(mal, atm("mal", "123", 50.0));

    let names: Vec<String> = dao
        .select_list()
        .await?
        .into_iter()
        .map(|a| a.aname)
        .collect();
    assert_eq!(names, ["kaylee", "mal", "zoe"]);
    assert_eq!(dao.count().await?, 3);

    dao.update(atm("mal", "secret", 75.0)).await?;
    assert_eq!(dao.select_one("mal").await?, atm("mal", "secret", 75.0));

    dao.delete("kaylee").await?;
    assert_eq!(dao.find("kaylee").await?, None);
    assert_eq!(dao.count().await?, 2);

    let rich = dao
        .rich([("min".to_string(), SqlValue::Float(60.0))].into_iter().collect())
        .await?;
    assert_eq!(rich.len(), 2);
    assert_eq!(rich[0]["aname"], SqlValue::Text("mal".into()));
    assert_eq!(rich[1]["abalance"], SqlValue::Float(120.5));

    assert_eq!(dao.clear().await?, 2);
    assert!(dao.select_list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn record_round_trips_through_the_database() -> Result<(), SqlMapperError> {
    let dir = tempfile::tempdir().unwrap();
    let dao = setup(&dir).await?;

    let original = atm("wash", "dinosaur", 0.5);
    dao.insert(original.clone()).await?;
    assert_eq!(dao.select_one("wash").await?, original);
    Ok(())
}

#[tokio::test]
async fn single_row_select_on_empty_table_fails() -> Result<(), SqlMapperError> {
    let dir = tempfile::tempdir().unwrap();
    let dao = setup(&dir).await?;

    let err = dao.select_one("nobody").await.unwrap_err();
    assert!(matches!(err, SqlMapperError::MappingError(_)));
    assert_eq!(dao.find("nobody").await?, None);
    assert!(dao.select_list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn driver_errors_surface_and_release() -> Result<(), SqlMapperError> {
    let dir = tempfile::tempdir().unwrap();
    let dao = setup(&dir).await?;

    dao.insert(atm("river", "x", 1.0)).await?;
    let err = dao.insert(atm("river", "y", 2.0)).await.unwrap_err();
    assert!(matches!(err, SqlMapperError::ExecutionError(_)));
    assert_eq!(dao.mapper().session().pool().busy_count(), 0);
    assert_eq!(dao.select_one("river").await?.apassword, "x");
    Ok(())
}

#[test]
fn generated_contract_describes_every_method() {
    let contract = AtmDao::contract();
    assert_eq!(contract.name(), "AtmDao");
    assert_eq!(contract.len(), 9);

    let insert = contract.descriptor("insert").unwrap();
    assert_eq!(insert.kind, OperationKind::Insert);
    assert_eq!(insert.return_shape, ReturnShape::NONE);

    let list = contract.descriptor("select_list").unwrap();
    assert_eq!(list.kind, OperationKind::Select);
    assert_eq!(list.return_shape.cardinality, Cardinality::Many);
    assert_eq!(list.return_shape.shape, Some(ResultShape::Record("Atm")));

    assert_eq!(
        contract.descriptor("count").unwrap().return_shape,
        ReturnShape::one(ResultShape::Scalar(ScalarKind::Integer))
    );
    assert_eq!(
        contract.descriptor("find").unwrap().return_shape.cardinality,
        Cardinality::Optional
    );
}
