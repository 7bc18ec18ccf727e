//! Request-scoped resolution cache.
//!
//! A [`LookupCache`] memoizes role and account resolutions for the duration
//! of one engine call. It is created by the call, passed explicitly to every
//! step that resolves names or ids, and dropped when the call returns, so no
//! resolution ever leaks from one request into another.
//!
//! Keys a resolver could not resolve are remembered as misses and are not
//! queried again within the same call.

use crate::access::{Account, Role};
use crate::context::RequestContext;
use crate::directory::{AccountResolver, RoleScopeResolver};
use crate::error::{EngineError, EngineResult};

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Memo of roles and accounts resolved during one request.
#[derive(Debug, Default)]
pub struct LookupCache {
    roles: HashMap<Uuid, Role>,
    role_ids_by_name: HashMap<String, Uuid>,
    missing_role_names: HashSet<String>,
    missing_role_ids: HashSet<Uuid>,
    accounts: HashMap<Uuid, Account>,
    account_ids_by_name: HashMap<String, Uuid>,
    missing_account_names: HashSet<String>,
    missing_account_ids: HashSet<Uuid>,
}

impl LookupCache {
    /// Create an empty cache for a new request.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self, id: &Uuid) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.role_ids_by_name
            .get(name)
            .and_then(|id| self.roles.get(id))
    }

    pub fn account(&self, id: &Uuid) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        self.account_ids_by_name
            .get(name)
            .and_then(|id| self.accounts.get(id))
    }

    /// Names neither cached nor known to be missing.
    pub fn unseen_role_names<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut unseen: Vec<String> = names
            .into_iter()
            .filter(|n| !self.role_ids_by_name.contains_key(*n) && !self.missing_role_names.contains(*n))
            .map(str::to_string)
            .collect();
        unseen.sort();
        unseen.dedup();
        unseen
    }

    /// Ids neither cached nor known to be missing.
    pub fn unseen_role_ids<I>(&self, ids: I) -> Vec<Uuid>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut unseen: Vec<Uuid> = ids
            .into_iter()
            .filter(|id| !self.roles.contains_key(id) && !self.missing_role_ids.contains(id))
            .collect();
        unseen.sort();
        unseen.dedup();
        unseen
    }

    pub fn unseen_account_names<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut unseen: Vec<String> = names
            .into_iter()
            .filter(|n| {
                !self.account_ids_by_name.contains_key(*n) && !self.missing_account_names.contains(*n)
            })
            .map(str::to_string)
            .collect();
        unseen.sort();
        unseen.dedup();
        unseen
    }

    pub fn unseen_account_ids<I>(&self, ids: I) -> Vec<Uuid>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut unseen: Vec<Uuid> = ids
            .into_iter()
            .filter(|id| !self.accounts.contains_key(id) && !self.missing_account_ids.contains(id))
            .collect();
        unseen.sort();
        unseen.dedup();
        unseen
    }

    fn insert_role(&mut self, role: Role) {
        self.missing_role_names.remove(&role.name);
        self.missing_role_ids.remove(&role.id);
        self.role_ids_by_name.insert(role.name.clone(), role.id);
        self.roles.insert(role.id, role);
    }

    fn insert_account(&mut self, account: Account) {
        self.missing_account_names.remove(&account.name);
        self.missing_account_ids.remove(&account.id);
        self.account_ids_by_name.insert(account.name.clone(), account.id);
        self.accounts.insert(account.id, account);
    }

    /// Record the answer to a role-by-name lookup.
    pub fn record_roles_by_name(&mut self, requested: &[String], found: Vec<Role>) {
        for role in found {
            self.insert_role(role);
        }
        for name in requested {
            if !self.role_ids_by_name.contains_key(name) {
                self.missing_role_names.insert(name.clone());
            }
        }
    }

    /// Record the answer to a role-by-id lookup.
    pub fn record_roles_by_id(&mut self, requested: &[Uuid], found: Vec<Role>) {
        for role in found {
            self.insert_role(role);
        }
        for id in requested {
            if !self.roles.contains_key(id) {
                self.missing_role_ids.insert(*id);
            }
        }
    }

    /// Record the answer to an account-by-name lookup.
    pub fn record_accounts_by_name(&mut self, requested: &[String], found: Vec<Account>) {
        for account in found {
            self.insert_account(account);
        }
        for name in requested {
            if !self.account_ids_by_name.contains_key(name) {
                self.missing_account_names.insert(name.clone());
            }
        }
    }

    /// Record the answer to an account-by-id lookup.
    pub fn record_accounts_by_id(&mut self, requested: &[Uuid], found: Vec<Account>) {
        for account in found {
            self.insert_account(account);
        }
        for id in requested {
            if !self.accounts.contains_key(id) {
                self.missing_account_ids.insert(*id);
            }
        }
    }

    /// Resolve role names not yet seen in this request.
    pub async fn load_roles_by_name<'a, R, I>(
        &mut self,
        ctx: &RequestContext,
        resolver: &R,
        names: I,
    ) -> EngineResult<()>
    where
        R: RoleScopeResolver,
        I: IntoIterator<Item = &'a str>,
    {
        let unseen = self.unseen_role_names(names);
        let found = fetch_roles_by_name(ctx, resolver, &unseen).await?;
        self.record_roles_by_name(&unseen, found);
        Ok(())
    }

    /// Resolve role ids not yet seen in this request.
    pub async fn load_roles_by_id<R, I>(
        &mut self,
        ctx: &RequestContext,
        resolver: &R,
        ids: I,
    ) -> EngineResult<()>
    where
        R: RoleScopeResolver,
        I: IntoIterator<Item = Uuid>,
    {
        let unseen = self.unseen_role_ids(ids);
        let found = fetch_roles_by_id(ctx, resolver, &unseen).await?;
        self.record_roles_by_id(&unseen, found);
        Ok(())
    }
}

/// Resolve role names, skipping the call when there is nothing to resolve.
pub async fn fetch_roles_by_name<R>(
    ctx: &RequestContext,
    resolver: &R,
    names: &[String],
) -> EngineResult<Vec<Role>>
where
    R: RoleScopeResolver,
{
    if names.is_empty() {
        return Ok(Vec::new());
    }
    resolver
        .resolve_roles_by_name(ctx, names)
        .await
        .map_err(|e| EngineError::collaborator("roles.resolve_by_name", names, e))
}

/// Resolve role ids, skipping the call when there is nothing to resolve.
pub async fn fetch_roles_by_id<R>(
    ctx: &RequestContext,
    resolver: &R,
    ids: &[Uuid],
) -> EngineResult<Vec<Role>>
where
    R: RoleScopeResolver,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    resolver
        .resolve_roles_by_id(ctx, ids)
        .await
        .map_err(|e| EngineError::collaborator("roles.resolve_by_id", ids, e))
}

/// Resolve account names, skipping the call when there is nothing to resolve.
pub async fn fetch_accounts_by_name<A>(
    ctx: &RequestContext,
    resolver: &A,
    names: &[String],
) -> EngineResult<Vec<Account>>
where
    A: AccountResolver,
{
    if names.is_empty() {
        return Ok(Vec::new());
    }
    resolver
        .resolve_accounts_by_name(ctx, names)
        .await
        .map_err(|e| EngineError::collaborator("accounts.resolve_by_name", names, e))
}

/// Resolve account ids, skipping the call when there is nothing to resolve.
pub async fn fetch_accounts_by_id<A>(
    ctx: &RequestContext,
    resolver: &A,
    ids: &[Uuid],
) -> EngineResult<Vec<Account>>
where
    A: AccountResolver,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    resolver
        .resolve_accounts_by_id(ctx, ids)
        .await
        .map_err(|e| EngineError::collaborator("accounts.resolve_by_id", ids, e))
}
