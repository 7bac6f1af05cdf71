//! Write path: property building, dry runs, and the degraded-schema retry.

use fitmirror_core::format::UNKNOWN;
use fitmirror_core::schema::activity as prop;
use fitmirror_core::{FormattedActivity, Icon, MappingTables, Properties, PropertyValue, StoredDocument};
use fitmirror_storage::{DocumentStore, StoreError};
use tracing::{info, warn};

/// Where a write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget<'a> {
    Create { collection: &'a str },
    Update { document_id: &'a str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Written(StoredDocument),
    /// Written only after category and subcategory were forced to `Unknown`.
    Degraded(StoredDocument),
    DryRun,
}

pub fn activity_properties(activity: &FormattedActivity, local_start: &str) -> Properties {
    let mut props = Properties::new();
    props.insert(prop::NAME.into(), PropertyValue::Title(activity.name.clone()));
    props.insert(prop::DATE.into(), PropertyValue::Date(Some(local_start.to_string())));
    props.insert(prop::CATEGORY.into(), select(&activity.category));
    props.insert(prop::SUBCATEGORY.into(), select(&activity.subcategory));
    props.insert(prop::DISTANCE_KM.into(), number(activity.distance_km));
    props.insert(prop::DURATION_MIN.into(), number(activity.duration_min));
    props.insert(prop::CALORIES.into(), number(activity.calories as f64));
    props.insert(prop::AVG_PACE.into(), PropertyValue::RichText(activity.pace.clone()));
    props.insert(prop::AVG_POWER.into(), number(activity.avg_power));
    props.insert(prop::MAX_POWER.into(), number(activity.max_power));
    props.insert(prop::TRAINING_EFFECT.into(), select(&activity.training_effect));
    props.insert(prop::AEROBIC.into(), number(activity.aerobic));
    props.insert(prop::AEROBIC_EFFECT.into(), select(&activity.aerobic_effect));
    props.insert(prop::ANAEROBIC.into(), number(activity.anaerobic));
    props.insert(prop::ANAEROBIC_EFFECT.into(), select(&activity.anaerobic_effect));
    props.insert(prop::PERSONAL_RECORD.into(), PropertyValue::Checkbox(activity.personal_record));
    props.insert(prop::FAVORITE.into(), PropertyValue::Checkbox(activity.favorite));
    if let Some(id) = activity.external_id {
        props.insert(prop::EXTERNAL_ID.into(), number(id as f64));
    }
    props
}

pub fn activity_icon(activity: &FormattedActivity, tables: &MappingTables) -> Option<Icon> {
    tables
        .icon(activity.icon_key())
        .map(|url| Icon::External(url.to_string()))
}

fn select(value: &str) -> PropertyValue {
    PropertyValue::Select(Some(value.to_string()))
}

fn number(value: f64) -> PropertyValue {
    PropertyValue::Number(Some(value))
}

pub struct UpsertExecutor<'a> {
    store: &'a dyn DocumentStore,
    tables: &'a MappingTables,
    dry_run: bool,
}

impl<'a> UpsertExecutor<'a> {
    pub fn new(store: &'a dyn DocumentStore, tables: &'a MappingTables, dry_run: bool) -> Self {
        Self {
            store,
            tables,
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Plain create/update with no retry.
    pub async fn write(
        &self,
        target: WriteTarget<'_>,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<WriteOutcome, StoreError> {
        if self.dry_run {
            info!(?target, properties = properties.len(), "dry run: skipping write");
            return Ok(WriteOutcome::DryRun);
        }
        let doc = match target {
            WriteTarget::Create { collection } => self.store.create(collection, properties, icon).await?,
            WriteTarget::Update { document_id } => self.store.update(document_id, properties, icon).await?,
        };
        Ok(WriteOutcome::Written(doc))
    }

    /// Writes the full activity property set. A schema rejection is retried
    /// exactly once with `Unknown` category and subcategory; a second failure
    /// is returned as is.
    pub async fn write_activity(
        &self,
        target: WriteTarget<'_>,
        activity: &FormattedActivity,
        local_start: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let properties = activity_properties(activity, local_start);
        let icon = activity_icon(activity, self.tables);
        match self.write(target, &properties, icon.as_ref()).await {
            Err(err) if err.is_schema_validation() => {
                warn!(
                    name = %activity.name,
                    category = %activity.category,
                    subcategory = %activity.subcategory,
                    error = %err,
                    "store rejected category; retrying with {UNKNOWN}"
                );
                let mut degraded = activity.clone();
                degraded.category = UNKNOWN.to_string();
                degraded.subcategory = UNKNOWN.to_string();
                let properties = activity_properties(&degraded, local_start);
                let icon = activity_icon(&degraded, self.tables);
                match self.write(target, &properties, icon.as_ref()).await? {
                    WriteOutcome::Written(doc) => Ok(WriteOutcome::Degraded(doc)),
                    other => Ok(other),
                }
            }
            other => other,
        }
    }
}
