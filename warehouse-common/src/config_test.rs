// pulse - bitdrift's observability proxy
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use super::*;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

#[derive(Debug, Deserialize, PartialEq)]
struct TestConfig {
  name: String,
  secret: Option<EnvOrInline>,
}

#[test]
fn env_or_inline_parsing() {
  let config: TestConfig = yaml_to_config("name: a\nsecret: hello").unwrap();
  assert_eq!(Some(EnvOrInline::Inline("hello".to_string())), config.secret);

  let config: TestConfig = yaml_to_config("name: a\nsecret:\n  env_var: FOO").unwrap();
  assert_eq!(
    Some(EnvOrInline::EnvVar {
      env_var: "FOO".to_string()
    }),
    config.secret
  );

  let config: TestConfig = yaml_to_config("name: a").unwrap();
  assert_eq!(None, config.secret);
}

#[test]
fn env_or_inline_resolve() {
  assert_eq!(
    Ok("inline".to_string()),
    EnvOrInline::Inline("inline".to_string()).resolve()
  );

  unsafe {
    std::env::set_var("WAREHOUSE_COMMON_CONFIG_TEST_SECRET", "from_env");
  }
  assert_eq!(
    Ok("from_env".to_string()),
    EnvOrInline::EnvVar {
      env_var: "WAREHOUSE_COMMON_CONFIG_TEST_SECRET".to_string()
    }
    .resolve()
  );

  assert_eq!(
    Err(MissingEnvVar(
      "WAREHOUSE_COMMON_CONFIG_TEST_NOT_SET".to_string()
    )),
    EnvOrInline::EnvVar {
      env_var: "WAREHOUSE_COMMON_CONFIG_TEST_NOT_SET".to_string()
    }
    .resolve()
  );
}

#[test]
fn load_file() {
  let mut file = NamedTempFile::new().unwrap();
  file.write_all(b"name: from_file\n").unwrap();
  let config: TestConfig = load_from_file(file.path().to_str().unwrap()).unwrap();
  assert_eq!(
    TestConfig {
      name: "from_file".to_string(),
      secret: None,
    },
    config
  );

  let error = load_from_file::<TestConfig>("/does/not/exist.yaml").unwrap_err();
  assert!(error.to_string().contains("/does/not/exist.yaml"));

  let mut file = NamedTempFile::new().unwrap();
  file.write_all(b"secret: [\n").unwrap();
  assert!(load_from_file::<TestConfig>(file.path().to_str().unwrap()).is_err());
}
