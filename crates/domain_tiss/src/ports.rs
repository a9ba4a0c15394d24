//! TISS Domain Ports
//!
//! Collaborators the claim engine consumes but does not own: clinic and
//! operator master data, artifact storage, batch persistence and the
//! prior-authorization stream.
//!
//! # Architecture
//!
//! Every port is a synchronous trait extending [`DomainPort`]. The
//! [`TissService`](crate::service::TissService) receives them as
//! `Arc<dyn Port>` and adapters decide where the data lives:
//!
//! - **In-memory adapters** ([`memory`]): used by the server binary and tests
//! - **Filesystem store**: provided by the API layer for XML artifacts
//!
//! # Optimistic concurrency
//!
//! [`BatchRepository::compare_and_set`] only stores a batch when the stored
//! copy still has the status and version the caller loaded. Two concurrent
//! response deliveries for the same batch therefore cannot both apply: the
//! second one fails with [`PortError::Conflict`].

use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClinicId, DomainPort, OperatorId, PortError, TenantId};

use crate::authorization::AuthorizationRequest;
use crate::batch::{BatchStatus, ClaimBatch};

/// Clinic master data needed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicInfo {
    pub id: ClinicId,
    /// Code the operator assigned to this provider
    pub provider_code: String,
    pub name: String,
}

/// Operator master data needed on the wire and in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub id: OperatorId,
    /// ANS registration of the operator
    pub ans_registration_number: String,
    pub trade_name: String,
}

pub trait ClinicLookup: DomainPort {
    fn get_clinic(&self, tenant: TenantId, clinic_id: ClinicId) -> Result<ClinicInfo, PortError>;
}

pub trait OperatorLookup: DomainPort {
    fn get_operator(&self, tenant: TenantId, operator_id: OperatorId) -> Result<OperatorInfo, PortError>;
}

/// Storage for generated XML artifacts
pub trait FileStore: DomainPort {
    /// Persists `bytes` under `name` and returns the stored path
    fn save(&self, bytes: &[u8], name: &str) -> Result<String, PortError>;
}

/// Tenant-scoped persistence of claim batches
pub trait BatchRepository: DomainPort {
    /// Next human-readable batch number for the tenant (`LOTE-000001`, ...)
    fn next_batch_number(&self, tenant: TenantId) -> Result<String, PortError>;

    /// Stores a new batch; `Conflict` on a duplicate id or batch number
    fn insert(&self, tenant: TenantId, batch: &ClaimBatch) -> Result<ClaimBatch, PortError>;

    /// `NotFound` when absent or owned by another tenant
    fn get(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, PortError>;

    /// Stores `batch` only if the stored copy still has `expected_status` and
    /// `expected_version`. Returns the stored batch with its version advanced.
    ///
    /// Guide numbers are unique per tenant: a store that would put a number
    /// already held by another batch fails with `Validation`. The check and
    /// the write are one atomic step.
    fn compare_and_set(
        &self,
        tenant: TenantId,
        batch: &ClaimBatch,
        expected_status: BatchStatus,
        expected_version: u64,
    ) -> Result<ClaimBatch, PortError>;

    fn list_by_clinic(&self, tenant: TenantId, clinic_id: ClinicId) -> Result<Vec<ClaimBatch>, PortError>;

    /// Batch currently holding a guide with this number, if any
    fn find_batch_by_guide_number(
        &self,
        tenant: TenantId,
        guide_number: &str,
    ) -> Result<Option<BatchId>, PortError>;
}

/// The prior-authorization request stream
pub trait AuthorizationRequestSource: DomainPort {
    fn list_by_clinic(
        &self,
        tenant: TenantId,
        clinic_id: ClinicId,
    ) -> Result<Vec<AuthorizationRequest>, PortError>;
}

/// In-memory adapters, thread-safe
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
    use tracing::debug;

    fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, PortError> {
        lock.read().map_err(|_| PortError::internal("in-memory store lock poisoned"))
    }

    fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, PortError> {
        lock.write().map_err(|_| PortError::internal("in-memory store lock poisoned"))
    }

    /// Clinic directory shared by all tenants
    #[derive(Debug, Default)]
    pub struct InMemoryClinicLookup {
        clinics: RwLock<HashMap<ClinicId, ClinicInfo>>,
    }

    impl InMemoryClinicLookup {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_clinics(clinics: impl IntoIterator<Item = ClinicInfo>) -> Self {
            let lookup = Self::new();
            if let Ok(mut map) = lookup.clinics.write() {
                map.extend(clinics.into_iter().map(|c| (c.id, c)));
            }
            lookup
        }

        pub fn insert(&self, clinic: ClinicInfo) -> Result<(), PortError> {
            write(&self.clinics)?.insert(clinic.id, clinic);
            Ok(())
        }
    }

    impl DomainPort for InMemoryClinicLookup {}

    impl ClinicLookup for InMemoryClinicLookup {
        fn get_clinic(&self, _tenant: TenantId, clinic_id: ClinicId) -> Result<ClinicInfo, PortError> {
            read(&self.clinics)?
                .get(&clinic_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Clinic", clinic_id))
        }
    }

    /// Operator directory shared by all tenants
    #[derive(Debug, Default)]
    pub struct InMemoryOperatorLookup {
        operators: RwLock<HashMap<OperatorId, OperatorInfo>>,
    }

    impl InMemoryOperatorLookup {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_operators(operators: impl IntoIterator<Item = OperatorInfo>) -> Self {
            let lookup = Self::new();
            if let Ok(mut map) = lookup.operators.write() {
                map.extend(operators.into_iter().map(|o| (o.id, o)));
            }
            lookup
        }

        pub fn insert(&self, operator: OperatorInfo) -> Result<(), PortError> {
            write(&self.operators)?.insert(operator.id, operator);
            Ok(())
        }
    }

    impl DomainPort for InMemoryOperatorLookup {}

    impl OperatorLookup for InMemoryOperatorLookup {
        fn get_operator(&self, _tenant: TenantId, operator_id: OperatorId) -> Result<OperatorInfo, PortError> {
            read(&self.operators)?
                .get(&operator_id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Operator", operator_id))
        }
    }

    /// Keeps artifacts in memory under `memory://{name}`
    #[derive(Debug, Default)]
    pub struct InMemoryFileStore {
        files: RwLock<HashMap<String, Vec<u8>>>,
    }

    impl InMemoryFileStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, path: &str) -> Option<Vec<u8>> {
            self.files.read().ok()?.get(path).cloned()
        }

        pub fn len(&self) -> usize {
            self.files.read().map(|f| f.len()).unwrap_or(0)
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl DomainPort for InMemoryFileStore {}

    impl FileStore for InMemoryFileStore {
        fn save(&self, bytes: &[u8], name: &str) -> Result<String, PortError> {
            if name.trim().is_empty() {
                return Err(PortError::validation("File name is required"));
            }
            let path = format!("memory://{}", name);
            write(&self.files)?.insert(path.clone(), bytes.to_vec());
            Ok(path)
        }
    }

    #[derive(Debug, Default)]
    struct BatchStore {
        batches: HashMap<(TenantId, BatchId), ClaimBatch>,
        sequences: HashMap<TenantId, u64>,
    }

    impl BatchStore {
        /// Fails when another batch of the tenant already holds one of `batch`'s guide numbers
        fn ensure_guide_numbers_free(&self, tenant: TenantId, batch: &ClaimBatch) -> Result<(), PortError> {
            let clash = self
                .batches
                .iter()
                .filter(|((t, id), _)| *t == tenant && *id != batch.id)
                .find_map(|((_, id), other)| {
                    batch
                        .guides()
                        .iter()
                        .find(|g| other.guide_by_number(&g.guide_number).is_some())
                        .map(|g| (g.guide_number.clone(), *id))
                });
            match clash {
                Some((number, owner)) => Err(PortError::validation(format!(
                    "Guide number {} is already used in batch {}",
                    number, owner
                ))),
                None => Ok(()),
            }
        }
    }

    /// Batch repository keyed by `(tenant, batch id)`
    #[derive(Debug, Default)]
    pub struct InMemoryBatchRepository {
        store: RwLock<BatchStore>,
    }

    impl InMemoryBatchRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for InMemoryBatchRepository {}

    impl BatchRepository for InMemoryBatchRepository {
        fn next_batch_number(&self, tenant: TenantId) -> Result<String, PortError> {
            let mut store = write(&self.store)?;
            let seq = store.sequences.entry(tenant).or_insert(0);
            *seq += 1;
            Ok(format!("LOTE-{:06}", seq))
        }

        fn insert(&self, tenant: TenantId, batch: &ClaimBatch) -> Result<ClaimBatch, PortError> {
            let mut store = write(&self.store)?;
            if store.batches.contains_key(&(tenant, batch.id)) {
                return Err(PortError::conflict(format!("Batch {} already exists", batch.id)));
            }
            let duplicate_number = store
                .batches
                .iter()
                .any(|((t, _), b)| *t == tenant && b.batch_number == batch.batch_number);
            if duplicate_number {
                return Err(PortError::conflict(format!(
                    "Batch number {} already in use",
                    batch.batch_number
                )));
            }
            store.ensure_guide_numbers_free(tenant, batch)?;
            let mut stored = batch.clone();
            stored.advance_version();
            store.batches.insert((tenant, stored.id), stored.clone());
            debug!(tenant = %tenant, batch_id = %stored.id, "Batch inserted");
            Ok(stored)
        }

        fn get(&self, tenant: TenantId, batch_id: BatchId) -> Result<ClaimBatch, PortError> {
            read(&self.store)?
                .batches
                .get(&(tenant, batch_id))
                .cloned()
                .ok_or_else(|| PortError::not_found("Batch", batch_id))
        }

        fn compare_and_set(
            &self,
            tenant: TenantId,
            batch: &ClaimBatch,
            expected_status: BatchStatus,
            expected_version: u64,
        ) -> Result<ClaimBatch, PortError> {
            let mut store = write(&self.store)?;
            let current = store
                .batches
                .get(&(tenant, batch.id))
                .ok_or_else(|| PortError::not_found("Batch", batch.id))?;
            if current.status() != expected_status || current.version() != expected_version {
                return Err(PortError::conflict(format!(
                    "Batch {} is {:?} at version {}, expected {:?} at version {}",
                    batch.id,
                    current.status(),
                    current.version(),
                    expected_status,
                    expected_version
                )));
            }
            store.ensure_guide_numbers_free(tenant, batch)?;
            let mut stored = batch.clone();
            stored.advance_version();
            store.batches.insert((tenant, stored.id), stored.clone());
            Ok(stored)
        }

        fn list_by_clinic(&self, tenant: TenantId, clinic_id: ClinicId) -> Result<Vec<ClaimBatch>, PortError> {
            let store = read(&self.store)?;
            let mut batches: Vec<ClaimBatch> = store
                .batches
                .iter()
                .filter(|((t, _), b)| *t == tenant && b.clinic_id == clinic_id)
                .map(|(_, b)| b.clone())
                .collect();
            batches.sort_by(|a, b| a.batch_number.cmp(&b.batch_number));
            Ok(batches)
        }

        fn find_batch_by_guide_number(
            &self,
            tenant: TenantId,
            guide_number: &str,
        ) -> Result<Option<BatchId>, PortError> {
            let store = read(&self.store)?;
            Ok(store
                .batches
                .iter()
                .filter(|((t, _), _)| *t == tenant)
                .find(|(_, b)| b.guide_by_number(guide_number).is_some())
                .map(|((_, id), _)| *id))
        }
    }

    /// Authorization requests per tenant
    #[derive(Debug, Default)]
    pub struct InMemoryAuthorizationSource {
        requests: RwLock<Vec<(TenantId, AuthorizationRequest)>>,
    }

    impl InMemoryAuthorizationSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, tenant: TenantId, request: AuthorizationRequest) -> Result<(), PortError> {
            write(&self.requests)?.push((tenant, request));
            Ok(())
        }
    }

    impl DomainPort for InMemoryAuthorizationSource {}

    impl AuthorizationRequestSource for InMemoryAuthorizationSource {
        fn list_by_clinic(
            &self,
            tenant: TenantId,
            clinic_id: ClinicId,
        ) -> Result<Vec<AuthorizationRequest>, PortError> {
            Ok(read(&self.requests)?
                .iter()
                .filter(|(t, r)| *t == tenant && r.clinic_id == clinic_id)
                .map(|(_, r)| r.clone())
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::*;
    use super::*;

    fn batch(clinic: ClinicId, number: &str) -> ClaimBatch {
        ClaimBatch::new(clinic, OperatorId::new(), number).unwrap()
    }

    #[test]
    fn test_batch_numbers_are_sequential_per_tenant() {
        let repo = InMemoryBatchRepository::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        assert_eq!(repo.next_batch_number(a).unwrap(), "LOTE-000001");
        assert_eq!(repo.next_batch_number(a).unwrap(), "LOTE-000002");
        assert_eq!(repo.next_batch_number(b).unwrap(), "LOTE-000001");
    }

    #[test]
    fn test_get_is_tenant_scoped() {
        let repo = InMemoryBatchRepository::new();
        let tenant = TenantId::new();
        let stored = repo.insert(tenant, &batch(ClinicId::new(), "LOTE-000001")).unwrap();
        assert!(repo.get(tenant, stored.id).is_ok());
        assert!(repo.get(TenantId::new(), stored.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_insert_rejects_duplicate_number() {
        let repo = InMemoryBatchRepository::new();
        let tenant = TenantId::new();
        repo.insert(tenant, &batch(ClinicId::new(), "LOTE-000001")).unwrap();
        let err = repo.insert(tenant, &batch(ClinicId::new(), "LOTE-000001")).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_compare_and_set_rejects_stale_writer() {
        let repo = InMemoryBatchRepository::new();
        let tenant = TenantId::new();
        let stored = repo.insert(tenant, &batch(ClinicId::new(), "LOTE-000001")).unwrap();

        let first = stored.clone();
        let second = stored.clone();
        let updated = repo
            .compare_and_set(tenant, &first, BatchStatus::Draft, stored.version())
            .unwrap();
        assert_eq!(updated.version(), stored.version() + 1);

        let err = repo
            .compare_and_set(tenant, &second, BatchStatus::Draft, stored.version())
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_compare_and_set_rejects_guide_number_held_elsewhere() {
        use crate::guide::{Beneficiary, ClaimGuide, GuideType};
        use chrono::NaiveDate;
        use core_kernel::{AppointmentId, InsuranceId};

        let guide = || {
            ClaimGuide::new(
                "G-1",
                GuideType::Consultation,
                AppointmentId::new(),
                InsuranceId::new(),
                Beneficiary { card_number: "1".into(), name: "P".into() },
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
            .unwrap()
        };
        let repo = InMemoryBatchRepository::new();
        let tenant = TenantId::new();
        let clinic = ClinicId::new();
        let mut first = repo.insert(tenant, &batch(clinic, "LOTE-000001")).unwrap();
        let mut second = repo.insert(tenant, &batch(clinic, "LOTE-000002")).unwrap();

        let version = first.version();
        first.add_guide(guide()).unwrap();
        repo.compare_and_set(tenant, &first, BatchStatus::Draft, version).unwrap();

        let version = second.version();
        second.add_guide(guide()).unwrap();
        let err = repo
            .compare_and_set(tenant, &second, BatchStatus::Draft, version)
            .unwrap_err();
        assert!(matches!(err, PortError::Validation { .. }));
        assert!(repo.get(tenant, second.id).unwrap().guides().is_empty());

        let other_tenant = TenantId::new();
        let mut elsewhere = repo.insert(other_tenant, &batch(clinic, "LOTE-000001")).unwrap();
        let version = elsewhere.version();
        elsewhere.add_guide(guide()).unwrap();
        assert!(repo.compare_and_set(other_tenant, &elsewhere, BatchStatus::Draft, version).is_ok());
    }

    #[test]
    fn test_file_store_round_trip() {
        let store = InMemoryFileStore::new();
        let path = store.save(b"<xml/>", "lote.xml").unwrap();
        assert_eq!(path, "memory://lote.xml");
        assert_eq!(store.get(&path).unwrap(), b"<xml/>".to_vec());
        assert!(store.save(b"", " ").is_err());
    }

    #[test]
    fn test_lookups_report_not_found() {
        let clinics = InMemoryClinicLookup::new();
        let operators = InMemoryOperatorLookup::new();
        assert!(clinics.get_clinic(TenantId::new(), ClinicId::new()).unwrap_err().is_not_found());
        assert!(operators.get_operator(TenantId::new(), OperatorId::new()).unwrap_err().is_not_found());
    }
}
