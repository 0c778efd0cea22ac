#![cfg(feature = "sqlite")]

use std::sync::Arc;

use sql_mapper::config;
use sql_mapper::prelude::*;

sql_mapper::sql_mapper! {
    pub struct CounterDao {
        #[insert("insert into counter (name) values (#{name})")]
        fn add(name: String);
        #[select("select name from counter order by name")]
        fn names() -> Vec<String>;
    }
}

// The global pool lives for the whole test binary, so everything touching it stays in one test.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn global_pool_is_built_once_from_installed_config() -> Result<(), SqlMapperError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("global.db");
    config::install(PoolConfig::sqlite(path.to_str().unwrap(), 2, 1))?;

    let again = config::install(PoolConfig::sqlite("other.db", 1, 1)).unwrap_err();
    assert!(matches!(again, SqlMapperError::ConfigError(_)));
    assert!(config::global()?.url.ends_with("global.db"));

    let (a, b) = tokio::join!(ConnectionPool::global(), ConnectionPool::global());
    let (a, b) = (a?, b?);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.size(), 2);

    Session::global()
        .await?
        .execute_batch("create table counter (name text not null);")
        .await?;

    let dao = CounterDao::global().await?;
    dao.add("b".to_string()).await?;
    dao.add("a".to_string()).await?;
    assert_eq!(dao.names().await?, ["a", "b"]);
    assert!(Arc::ptr_eq(dao.mapper().session().pool(), &a));
    Ok(())
}

#[test]
fn config_files_load_by_extension() -> Result<(), SqlMapperError> {
    let dir = tempfile::tempdir().unwrap();

    let props = dir.path().join("config.properties");
    std::fs::write(
        &props,
        "# atm pool\ndriverClassIdentifier=sqlite\nurl=atm.db\nuser=\npassword=\nminConnectCount=4\nwaitTime=3\n",
    )
    .unwrap();
    assert_eq!(PoolConfig::from_file(&props)?, PoolConfig::sqlite("atm.db", 4, 3));

    let json = dir.path().join("config.json");
    std::fs::write(
        &json,
        r#"{"driverClassIdentifier": "sqlite", "url": "atm.db", "minConnectCount": 4, "waitTime": 3}"#,
    )
    .unwrap();
    assert_eq!(PoolConfig::from_file(&json)?, PoolConfig::sqlite("atm.db", 4, 3));

    let missing = PoolConfig::from_file(dir.path().join("absent.properties")).unwrap_err();
    assert!(matches!(missing, SqlMapperError::ConfigError(_)));
    Ok(())
}
