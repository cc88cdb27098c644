//! In-memory identity service covering both API versions.
//!
//! One mock implements the shared, v2 and v3 traits so a test can wrap it in
//! either [`IdentityAdapter`] variant. Create calls answer in the configured
//! [`PayloadShape`] to exercise response normalization.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloud_test_utils::{MockIdentity, PayloadShape};
//!
//! let identity = MockIdentity::new()
//!     .with_payload_shape(PayloadShape::Flat)
//!     .with_role("Member");
//! let adapter = identity.v3_adapter();
//! ```

use crate::call_log::{CallLog, FailurePlan, InjectedFailure};
use crate::test_ids::{TEST_DOMAIN_ID, TEST_DOMAIN_NAME};
use async_trait::async_trait;
use cloud_tests::adapters::{IdentityAdapter, IdentityApi, IdentityV2Api, IdentityV3Api};
use cloud_tests::models::{Domain, Project, Role};
use common::error::{CloudError, Result};
use common::secret::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// How create calls wrap the returned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// `{"user": {...}}`
    #[default]
    Nested,
    /// The bare record.
    Flat,
}

/// How the domain listing behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainLookup {
    /// Filter the configured domains by name.
    #[default]
    Filter,
    /// Answer `NotFound` for any lookup.
    NotFound,
}

/// A user as stored by the mock.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
struct MockIdentityInner {
    next_id: u64,
    projects: HashMap<String, Project>,
    users: HashMap<String, StoredUser>,
    roles: Vec<Role>,
    assignments: HashSet<(String, String, String)>,
    domains: Vec<Domain>,
    domain_lookup: DomainLookup,
    shape: PayloadShape,
    failures: FailurePlan,
}

impl Default for MockIdentityInner {
    fn default() -> Self {
        Self {
            next_id: 0,
            projects: HashMap::new(),
            users: HashMap::new(),
            roles: Vec::new(),
            assignments: HashSet::new(),
            domains: vec![Domain {
                id: TEST_DOMAIN_ID.to_string(),
                name: TEST_DOMAIN_NAME.to_string(),
            }],
            domain_lookup: DomainLookup::default(),
            shape: PayloadShape::default(),
            failures: FailurePlan::default(),
        }
    }
}

impl MockIdentityInner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn wrap(&self, key: &str, record: Value) -> Value {
        match self.shape {
            PayloadShape::Nested => Value::Object(Map::from_iter([(key.to_string(), record)])),
            PayloadShape::Flat => record,
        }
    }

    fn wrap_list(&self, key: &str, records: Vec<Value>) -> Value {
        match self.shape {
            PayloadShape::Nested => {
                Value::Object(Map::from_iter([(key.to_string(), Value::Array(records))]))
            }
            PayloadShape::Flat => Value::Array(records),
        }
    }

    fn create_project(&mut self, name: &str, description: &str, domain_id: Option<&str>) -> Value {
        let project = Project {
            id: self.next_id("project"),
            name: name.to_string(),
            description: Some(description.to_string()),
            domain_id: domain_id.map(str::to_string),
        };
        self.projects.insert(project.id.clone(), project.clone());
        project_json(&project)
    }

    fn delete_project(&mut self, project_id: &str) -> Result<()> {
        self.projects
            .remove(project_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("Could not find project: {project_id}")))
    }
}

fn project_json(project: &Project) -> Value {
    let mut value = json!({
        "id": project.id,
        "name": project.name,
        "description": project.description,
        "enabled": true,
    });
    if let Some(domain_id) = &project.domain_id {
        value["domain_id"] = json!(domain_id);
    }
    value
}

/// Mock identity service.
#[derive(Debug, Clone)]
pub struct MockIdentity {
    inner: Arc<Mutex<MockIdentityInner>>,
    log: CallLog,
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockIdentityInner::default())),
            log: CallLog::new(),
        }
    }

    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    #[must_use]
    pub fn with_payload_shape(self, shape: PayloadShape) -> Self {
        self.inner.lock().unwrap().shape = shape;
        self
    }

    /// Pre-create a role.
    #[must_use]
    pub fn with_role(self, name: &str) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id("role");
            inner.roles.push(Role {
                id,
                name: name.to_string(),
            });
        }
        self
    }

    /// Add a domain to the listing.
    #[must_use]
    pub fn with_domain(self, id: &str, name: &str) -> Self {
        self.inner.lock().unwrap().domains.push(Domain {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_domain_lookup(self, lookup: DomainLookup) -> Self {
        self.inner.lock().unwrap().domain_lookup = lookup;
        self
    }

    #[must_use]
    pub fn fail_on(self, operation: &str, failure: InjectedFailure) -> Self {
        self.inner.lock().unwrap().failures.insert(operation, failure);
        self
    }

    /// Wrap this mock as a v2 adapter.
    pub fn v2_adapter(&self) -> IdentityAdapter {
        IdentityAdapter::v2(Arc::new(self.clone()))
    }

    /// Wrap this mock as a v3 adapter.
    pub fn v3_adapter(&self) -> IdentityAdapter {
        IdentityAdapter::v3(Arc::new(self.clone()))
    }

    pub fn call_log(&self) -> &CallLog {
        &self.log
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.log.count(operation)
    }

    pub fn project(&self, project_id: &str) -> Option<Project> {
        self.inner.lock().unwrap().projects.get(project_id).cloned()
    }

    pub fn user(&self, user_id: &str) -> Option<StoredUser> {
        self.inner.lock().unwrap().users.get(user_id).cloned()
    }

    pub fn project_count(&self) -> usize {
        self.inner.lock().unwrap().projects.len()
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn role_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.roles.iter().map(|r| r.name.clone()).collect()
    }

    /// Whether `user_id` holds the role named `role_name` on `project_id`.
    pub fn has_assignment(&self, project_id: &str, user_id: &str, role_name: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .roles
            .iter()
            .filter(|r| r.name == role_name)
            .any(|r| {
                inner.assignments.contains(&(
                    project_id.to_string(),
                    user_id.to_string(),
                    r.id.clone(),
                ))
            })
    }

    pub fn assignment_count(&self) -> usize {
        self.inner.lock().unwrap().assignments.len()
    }

    fn begin(&self, operation: &str, resource: &str) -> Result<MutexGuard<'_, MockIdentityInner>> {
        self.log.record(format!("{operation}:{resource}"));
        let inner = self.inner.lock().unwrap();
        inner.failures.check(operation)?;
        Ok(inner)
    }
}

#[async_trait]
impl IdentityApi for MockIdentity {
    async fn create_user(
        &self,
        name: &str,
        password: &SecretString,
        project_id: &str,
        email: &str,
    ) -> Result<Value> {
        let mut inner = self.begin("create_user", name)?;
        if !inner.projects.contains_key(project_id) {
            return Err(CloudError::NotFound(format!("Could not find project: {project_id}")));
        }
        let user = StoredUser {
            id: inner.next_id("user"),
            name: name.to_string(),
            project_id: project_id.to_string(),
            email: email.to_string(),
            password: password.expose_secret().to_string(),
        };
        inner.users.insert(user.id.clone(), user.clone());

        let record = json!({
            "id": user.id,
            "name": user.name,
            "email": user.email,
            "tenantId": user.project_id,
            "enabled": true,
        });
        Ok(inner.wrap("user", record))
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut inner = self.begin("delete_user", user_id)?;
        inner
            .users
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("Could not find user: {user_id}")))
    }

    async fn create_role(&self, name: &str) -> Result<Value> {
        let mut inner = self.begin("create_role", name)?;
        if inner.roles.iter().any(|r| r.name == name) {
            return Err(CloudError::Conflict(format!("Duplicate entry for role {name}")));
        }
        let role = Role {
            id: inner.next_id("role"),
            name: name.to_string(),
        };
        inner.roles.push(role.clone());
        Ok(inner.wrap("role", json!({"id": role.id, "name": role.name})))
    }

    async fn list_roles(&self) -> Result<Value> {
        let inner = self.begin("list_roles", "*")?;
        let roles = inner
            .roles
            .iter()
            .map(|r| json!({"id": r.id, "name": r.name}))
            .collect();
        Ok(inner.wrap_list("roles", roles))
    }

    async fn assign_user_role(&self, project_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        let resource = format!("{project_id}/{user_id}/{role_id}");
        let mut inner = self.begin("assign_user_role", &resource)?;
        if !inner.roles.iter().any(|r| r.id == role_id) {
            return Err(CloudError::NotFound(format!("Could not find role: {role_id}")));
        }
        let assignment = (project_id.to_string(), user_id.to_string(), role_id.to_string());
        if !inner.assignments.insert(assignment) {
            return Err(CloudError::Conflict(format!(
                "User {user_id} already has role {role_id} in tenant {project_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityV2Api for MockIdentity {
    async fn create_tenant(&self, name: &str, description: &str) -> Result<Value> {
        let mut inner = self.begin("create_tenant", name)?;
        let record = inner.create_project(name, description, None);
        Ok(inner.wrap("tenant", record))
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<()> {
        self.begin("delete_tenant", tenant_id)?.delete_project(tenant_id)
    }
}

#[async_trait]
impl IdentityV3Api for MockIdentity {
    async fn create_project(
        &self,
        name: &str,
        description: &str,
        domain_id: &str,
    ) -> Result<Value> {
        let mut inner = self.begin("create_project", name)?;
        if !inner.domains.iter().any(|d| d.id == domain_id) {
            return Err(CloudError::NotFound(format!("Could not find domain: {domain_id}")));
        }
        let record = inner.create_project(name, description, Some(domain_id));
        Ok(inner.wrap("project", record))
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.begin("delete_project", project_id)?.delete_project(project_id)
    }

    async fn list_domains(&self, name: Option<&str>) -> Result<Value> {
        let inner = self.begin("list_domains", name.unwrap_or("*"))?;
        if inner.domain_lookup == DomainLookup::NotFound {
            return Err(CloudError::NotFound("Could not find domain".to_string()));
        }
        let domains = inner
            .domains
            .iter()
            .filter(|d| name.map_or(true, |n| d.name == n))
            .map(|d| json!({"id": d.id, "name": d.name}))
            .collect();
        Ok(inner.wrap_list("domains", domains))
    }
}
