use crate::clients::cloudflare::{CloudflareClient, ProviderRecord, UpdateRequest};
use crate::config::Profile;
use crate::error::{Error, Result};
use crate::ip::PublicAddress;

/// What to do with the listing for our record name.
#[derive(Debug, PartialEq)]
pub enum Plan<'a> {
    /// The record already holds our address.
    Unchanged(&'a ProviderRecord),
    /// The record holds something else and must be patched.
    Update(&'a ProviderRecord),
}

/// How a run ended, when it ended well.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Unchanged {
        record_id: String,
    },
    Updated {
        record_id: String,
        previous: String,
        current: String,
    },
    /// Test mode: the patch that would have been sent.
    DryRun {
        record_id: String,
        update: UpdateRequest,
    },
}

/// Decide between no-op and update.
///
/// # Errors
///
/// - `RecordNotFound` when the listing is empty; records are never created.
/// - `NoMatchingRecord` when nothing listed has the address's record type.
/// - `AmbiguousRecord` when more than one does.
pub fn plan<'a>(
    records: &'a [ProviderRecord],
    address: &PublicAddress,
    zone_id: &str,
) -> Result<Plan<'a>> {
    if records.is_empty() {
        return Err(Error::RecordNotFound {
            ip: address.to_string(),
            zone_id: zone_id.to_string(),
        });
    }

    let record_type = address.record_type();
    let matching: Vec<&ProviderRecord> = records
        .iter()
        .filter(|record| record.record_type == record_type)
        .collect();

    match matching.as_slice() {
        [] => Err(Error::NoMatchingRecord {
            record_type: record_type.to_string(),
            found: records.iter().map(|r| r.record_type.clone()).collect(),
        }),
        [record] if address.matches(&record.content) => Ok(Plan::Unchanged(record)),
        [record] => Ok(Plan::Update(record)),
        many => Err(Error::AmbiguousRecord {
            record_type: record_type.to_string(),
            count: many.len(),
        }),
    }
}

/// Bring the profile's record in line with `address`.
///
/// Lists the record, then patches it only if its content differs. With
/// `dry_run` the patch is logged instead of sent.
pub fn reconcile(
    client: &CloudflareClient,
    profile: &Profile,
    address: &PublicAddress,
    dry_run: bool,
) -> Result<Outcome> {
    let record_type = address.record_type();
    let records = client.list_records(record_type, &profile.record_name)?;

    let record = match plan(&records, address, client.zone_id())? {
        Plan::Unchanged(record) => {
            log::info!(
                "no need to update record, ip has not changed (type: {}, current public ip: {}, ip on file: {})",
                record_type, address, record.content
            );
            return Ok(Outcome::Unchanged {
                record_id: record.id.clone(),
            });
        }
        Plan::Update(record) => record,
    };

    if record.id.is_empty() {
        return Err(Error::Decode(format!(
            "{} record for {} was listed without an id",
            record_type, profile.record_name
        )));
    }

    let update = UpdateRequest::new(profile, address);

    if dry_run {
        log::info!(
            "TEST MODE: Would update {} {} from {} to {} (record {})",
            record_type, profile.record_name, record.content, address, record.id
        );
        return Ok(Outcome::DryRun {
            record_id: record.id.clone(),
            update,
        });
    }

    let result = client.patch_record(&record.id, &update)?;
    log::info!(
        "successfully updated dns record {} from {} to {}",
        profile.record_name, record.content, address
    );
    log::debug!("Cloudflare reported: {:?}", result);

    Ok(Outcome::Updated {
        record_id: record.id.clone(),
        previous: record.content.clone(),
        current: address.to_string(),
    })
}
