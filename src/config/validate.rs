// src/config/validate.rs

use crate::config::model::{GroupSpec, RawSuiteFile, SuiteFile, TestSpec};
use crate::errors::{Result, SuitedagError};

impl TryFrom<RawSuiteFile> for SuiteFile {
    type Error = SuitedagError;

    fn try_from(raw: RawSuiteFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_suite(&raw)?;
        Ok(SuiteFile::new_unchecked(raw.config, raw.suite))
    }
}

fn validate_raw_suite(raw: &RawSuiteFile) -> Result<()> {
    ensure_has_tests(&raw.suite)?;
    validate_group(&raw.suite, "suite")?;
    Ok(())
}

fn ensure_has_tests(suite: &GroupSpec) -> Result<()> {
    if suite.test_count() == 0 {
        return Err(SuitedagError::ConfigError(
            "suite must contain at least one [[...test]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_group(group: &GroupSpec, path: &str) -> Result<()> {
    for (idx, test) in group.test.iter().enumerate() {
        let at = format!("{path}.test[{idx}]");
        let title = test.title.as_deref().map(str::trim).unwrap_or("");
        if title.is_empty() {
            return Err(SuitedagError::ConfigError(format!(
                "{at} must have a non-empty `title`"
            )));
        }
        if test.cmd.is_none() && !test.skip {
            return Err(SuitedagError::ConfigError(format!(
                "{at} ('{title}') has no `cmd`; set one or mark it `skip = true`"
            )));
        }
        validate_cmd(test, &at)?;
    }

    let hooks = [
        ("before_all", &group.before_all),
        ("before_each", &group.before_each),
        ("after_each", &group.after_each),
        ("after_all", &group.after_all),
    ];
    for (kind, entries) in hooks {
        for (idx, hook) in entries.iter().enumerate() {
            let at = format!("{path}.{kind}[{idx}]");
            if hook.cmd.is_none() {
                return Err(SuitedagError::ConfigError(format!(
                    "{at} must have a `cmd`"
                )));
            }
            validate_cmd(hook, &at)?;
        }
    }

    for (idx, child) in group.group.iter().enumerate() {
        let at = format!("{path}.group[{idx}]");
        let title = child.title.as_deref().map(str::trim).unwrap_or("");
        if title.is_empty() {
            return Err(SuitedagError::ConfigError(format!(
                "{at} must have a non-empty `title`"
            )));
        }
        validate_group(child, &at)?;
    }

    Ok(())
}

fn validate_cmd(entry: &TestSpec, at: &str) -> Result<()> {
    if let Some(cmd) = &entry.cmd {
        if cmd.trim().is_empty() {
            return Err(SuitedagError::ConfigError(format!(
                "{at} has an empty `cmd`"
            )));
        }
    }
    Ok(())
}
