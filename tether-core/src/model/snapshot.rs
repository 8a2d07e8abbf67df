//! Snapshots
//!
//! A [`Snapshot`] is the plain-data form of a model: one dynamic value per
//! member name. The host's save system decides how to persist it; this crate
//! only produces snapshots ([`DataModel::snapshot`]) and applies them
//! ([`DataModel::load_data_from_model`]).
//!
//! # Loading
//!
//! Loading is best-effort and strict per member:
//!
//! - Members are matched by name.
//! - Observable members are assigned through their setter, so their handlers
//!   fire.
//! - A value that does not decode into the live member's type is an error for
//!   that member only. It is logged and the member keeps its value.
//! - Read-only members, members missing from the snapshot and snapshot
//!   entries the model does not declare are skipped.
//!
//! [`DataModel::snapshot`]: super::DataModel::snapshot
//! [`DataModel::load_data_from_model`]: super::DataModel::load_data_from_model

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::{Access, ModelSchema};
use crate::error::{describe_value, LoadError, ValueError};

/// Member name -> dynamic value, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    members: IndexMap<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from any serializable struct, for example a save
    /// record written by an older version of the model.
    pub fn from_serializable<T: Serialize + ?Sized>(source: &T) -> Result<Self, LoadError> {
        Self::from_value(serde_json::to_value(source)?)
    }

    /// Build a snapshot from a JSON object.
    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        match value {
            Value::Object(map) => Ok(Self {
                members: map.into_iter().collect(),
            }),
            other => Err(LoadError::NotAnObject {
                found: describe_value(&other),
            }),
        }
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.members.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.members.into_iter().collect())
    }
}

/// Why a member was not restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ReadOnly,
    MissingInSnapshot,
    /// The snapshot has an entry the model does not declare.
    UnknownMember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMember {
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of [`DataModel::load_data_from_model`](super::DataModel::load_data_from_model).
#[derive(Debug, Default)]
pub struct LoadReport {
    pub restored: Vec<&'static str>,
    pub skipped: Vec<SkippedMember>,
    pub errors: Vec<LoadError>,
}

impl LoadReport {
    /// `true` if no member failed to load. Skips do not count.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn was_restored(&self, name: &str) -> bool {
        self.restored.contains(&name)
    }

    fn skip(&mut self, name: impl Into<String>, reason: SkipReason) {
        let name = name.into();
        tracing::debug!(member = %name, ?reason, "snapshot member skipped");
        self.skipped.push(SkippedMember { name, reason });
    }
}

impl<M> ModelSchema<M> {
    /// Capture every member of `model`. Members that fail to encode are
    /// logged and left out.
    pub(crate) fn capture(&self, model: &M) -> Snapshot {
        let mut snapshot = Snapshot::new();

        for member in self.members.values() {
            let encoded = match &member.access {
                Access::Observable(access) => access.get(model).persisted_value(),
                Access::Plain(access) => access.read(model),
            };
            match encoded {
                Ok(value) => {
                    snapshot.insert_value(member.info.name, value);
                }
                Err(err) => tracing::error!(
                    model = self.model_type(),
                    member = member.info.name,
                    error = %err,
                    "member left out of snapshot"
                ),
            }
        }

        snapshot
    }

    /// Apply `snapshot` to `model`, member by member.
    pub(crate) fn restore(&self, model: &mut M, snapshot: &Snapshot) -> LoadReport {
        let mut report = LoadReport::default();

        for member in self.members.values() {
            let name = member.info.name;
            if member.info.read_only {
                report.skip(name, SkipReason::ReadOnly);
                continue;
            }
            let Some(value) = snapshot.get(name) else {
                report.skip(name, SkipReason::MissingInSnapshot);
                continue;
            };

            let outcome = match &member.access {
                Access::Observable(access) => access.get(model).assign_value(value.clone()),
                Access::Plain(access) => match access.write(model, value.clone()) {
                    Some(outcome) => outcome,
                    None => {
                        report.skip(name, SkipReason::ReadOnly);
                        continue;
                    }
                },
            };

            match outcome {
                Ok(()) => report.restored.push(name),
                Err(err) => {
                    let err = load_error(name, err);
                    tracing::error!(
                        model = self.model_type(),
                        member = name,
                        error = %err,
                        "snapshot member does not match the model; keeping current value"
                    );
                    report.errors.push(err);
                }
            }
        }

        for (name, _) in snapshot.iter() {
            if !self.members.contains_key(name) {
                report.skip(name, SkipReason::UnknownMember);
            }
        }

        tracing::debug!(
            model = self.model_type(),
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "snapshot applied"
        );
        report
    }
}

fn load_error(member: &str, err: ValueError) -> LoadError {
    match err {
        ValueError::Decode {
            expected,
            found,
            source,
        } => LoadError::TypeMismatch {
            member: member.to_string(),
            expected,
            found,
            source,
        },
        other => LoadError::Member {
            member: member.to_string(),
            source: other,
        },
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataModel, ModelCore, SchemaBuilder};
    use crate::reactive::{ObservableList, ObservableVariable};
    use serde_json::json;

    #[derive(Default)]
    struct Profile {
        core: ModelCore,
        name: ObservableVariable<String>,
        level: ObservableVariable<u32>,
        tags: ObservableList<String>,
        title: String,
        version: u32,
    }

    impl DataModel for Profile {
        fn core(&self) -> &ModelCore {
            &self.core
        }

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .observable("name", |m: &Self| &m.name)
                .observable("level", |m: &Self| &m.level)
                .observable("tags", |m: &Self| &m.tags)
                .field("title", |m: &Self| &m.title, |m: &mut Self| &mut m.title)
                .read_only("version", |m: &Self| &m.version);
        }
    }

    #[test]
    fn snapshot_captures_every_member() {
        let profile = Profile {
            version: 3,
            ..Profile::default()
        };
        profile.name.set_value("ada".into());
        profile.tags.push("admin".into());

        let snapshot = profile.snapshot();
        assert_eq!(
            snapshot.clone().into_value(),
            json!({
                "name": "ada",
                "level": 0,
                "tags": ["admin"],
                "title": "",
                "version": 3,
            })
        );
        let names: Vec<_> = snapshot.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["name", "level", "tags", "title", "version"]);
    }

    #[test]
    fn restore_round_trips_between_instances() {
        let source = Profile::default();
        source.level.set_value(12);
        source.tags.set_value(vec!["a".into(), "b".into()]);

        let mut target = Profile::default();
        let report = target.load_data_from_model(&source.snapshot());

        assert!(report.is_clean());
        assert_eq!(target.level.value(), 12);
        assert_eq!(target.tags.value(), vec!["a", "b"]);
        assert!(report.was_restored("title"));
        assert!(report
            .skipped
            .contains(&SkippedMember { name: "version".into(), reason: SkipReason::ReadOnly }));
    }

    #[test]
    fn mismatched_member_is_skipped_and_others_restore() {
        let mut profile = Profile::default();
        profile.name.set_value("before".into());

        let snapshot = Snapshot::from_value(json!({
            "name": 42,
            "level": 7,
            "title": "Knight",
            "legacy": true,
        }))
        .unwrap();

        let report = profile.load_data_from_model(&snapshot);

        assert_eq!(profile.name.value(), "before");
        assert_eq!(profile.level.value(), 7);
        assert_eq!(profile.title, "Knight");

        assert_eq!(report.errors.len(), 1);
        match &report.errors[0] {
            LoadError::TypeMismatch { member, found, .. } => {
                assert_eq!(member, "name");
                assert_eq!(found, "number 42");
            }
            other => panic!("unexpected error: {other}"),
        }

        let reasons: Vec<_> = report.skipped.iter().map(|s| (s.name.as_str(), s.reason)).collect();
        assert!(reasons.contains(&("tags", SkipReason::MissingInSnapshot)));
        assert!(reasons.contains(&("legacy", SkipReason::UnknownMember)));
    }

    #[test]
    fn restore_fires_observable_handlers() {
        let mut profile = Profile::default();
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        profile.level.subscribe(move |level| seen_clone.lock().push(level.value()));

        let snapshot = Snapshot::from_value(json!({ "level": 9 })).unwrap();
        profile.load_data_from_model(&snapshot);

        assert_eq!(*seen.lock(), vec![9]);
    }

    #[test]
    fn snapshot_sources_must_be_objects() {
        assert!(matches!(
            Snapshot::from_value(json!([1, 2])),
            Err(LoadError::NotAnObject { .. })
        ));

        #[derive(Serialize)]
        struct OldSave {
            level: u32,
        }
        let snapshot = Snapshot::from_serializable(&OldSave { level: 4 }).unwrap();
        assert_eq!(snapshot.get("level"), Some(&json!(4)));
    }

    #[test]
    fn snapshot_serializes_as_a_plain_object() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_value("hp", json!(80));

        let text = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(text, r#"{"hp":80}"#);

        let back: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snapshot);
    }
}
