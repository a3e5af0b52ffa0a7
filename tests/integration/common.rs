use sintegra_queue::config::Config;
use tempfile::TempDir;

/// A registry result page with a handful of labelled fields
pub const RESULT_PAGE: &str = r#"
<html><body>
  <div><b>CNPJ</b><div>00.006.486/0001-75</div></div>
  <div><b>Inscrição Estadual</b><div>10.123.456-7</div></div>
  <div><b>Nome Empresarial</b><div>ACME COMERCIO LTDA</div></div>
  <div><b>Situação Cadastral Vigente</b><div>ATIVO - HABILITADO</div></div>
</body></html>
"#;

/// Builds a configuration whose databases live in `dir`
pub fn test_config(dir: &TempDir, base_url: &str) -> Config {
    let mut config = Config::default();
    let pipeline = dir.path().join("pipeline.db");

    config.broker.database_path = pipeline.to_string_lossy().into_owned();
    config.broker.connect_retry_delay_ms = 10;
    config.status.database_path = pipeline.to_string_lossy().into_owned();
    config.fetcher.base_url = base_url.to_string();
    config.fetcher.request_timeout_seconds = 5;
    config.persistence.database_path = dir
        .path()
        .join("registrants.db")
        .to_string_lossy()
        .into_owned();
    config
}
