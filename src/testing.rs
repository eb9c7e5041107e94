//! Catalog schema emulation on top of `MemoryStore`.
//!
//! Handlers are registered for the exact statements the repositories issue,
//! so tests exercise the real SQL text, parameter order and row shapes
//! (join fan-out, NULL child groups, delimited aggregate columns). Cascades
//! and unique constraints of the schema are mirrored by hand.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::db::memory::{param, param_id, MemoryStore, Reply, Tables};
use crate::db::{Row, SqlValue, Statement, StoreError};
use crate::models::{Category, Location};
use crate::relational::association::{LinkTable, PRODUCT_CATEGORIES, ROLE_PRIVILEGES, USER_ROLES};
use crate::repositories::{
    accounts, categories, delete_sql, inventory, locations, products, roles, suppliers,
};

pub const SEEDED_ROLES: [&str; 3] = ["ROLE_ADMIN", "ROLE_MANAGER", "ROLE_STAFF"];

/// Value every `NOW()` evaluates to.
pub fn fixed_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|date| date.and_hms_opt(9, 30, 0))
        .expect("valid timestamp")
}

pub fn catalog_store() -> MemoryStore {
    let store = MemoryStore::new();

    for (table, column) in [
        ("products", "id"),
        ("categories", "id"),
        ("categories", "name"),
        ("locations", "id"),
        ("locations", "name"),
        ("inventory", "id"),
        ("suppliers", "id"),
        ("roles", "id"),
        ("roles", "name"),
        ("privileges", "id"),
        ("users", "id"),
        ("users", "username"),
        ("users", "email"),
    ] {
        exists_on(&store, table, column);
    }
    for link in [PRODUCT_CATEGORIES, USER_ROLES, ROLE_PRIVILEGES] {
        link_table(&store, link);
    }
    for table in ["products", "inventory", "suppliers"] {
        update_on(&store, table);
    }
    delete_on(&store, "products", |t, id| {
        t.cascade("products_categories", id, true);
        remove_where(t, "inventory", "product_id", id);
    });
    delete_on(&store, "categories", |t, id| {
        t.cascade("products_categories", id, false)
    });
    delete_on(&store, "locations", |t, id| {
        remove_where(t, "inventory", "location_id", id)
    });
    delete_on(&store, "inventory", |_, _| {});
    delete_on(&store, "suppliers", |_, _| {});
    delete_on(&store, "users", |t, id| t.cascade("users_roles", id, true));

    product_statements(&store);
    named_statements(&store, "categories", categories::INSERT, categories::FIND_BY_ID, categories::FIND_BY_NAME);
    named_statements(&store, "locations", locations::INSERT, locations::FIND_BY_ID, locations::FIND_BY_NAME);
    category_by_product(&store);
    inventory_statements(&store);
    supplier_statements(&store);
    role_statements(&store);
    account_statements(&store);

    store.with_tables(|t| {
        for name in SEEDED_ROLES {
            t.insert("roles", Row::new().with("name", name));
        }
    });
    store
}

pub fn seed_category(store: &MemoryStore, name: &str) -> Category {
    let id = store.with_tables(|t| t.insert("categories", Row::new().with("name", name)));
    Category {
        id,
        name: name.to_string(),
    }
}

pub fn seed_location(store: &MemoryStore, name: &str) -> Location {
    let id = store.with_tables(|t| t.insert("locations", Row::new().with("name", name)));
    Location {
        id,
        name: name.to_string(),
    }
}

pub fn seed_product(store: &MemoryStore, name: &str, category_ids: &[i64]) -> i64 {
    store.with_tables(|t| {
        let id = t.insert(
            "products",
            Row::new()
                .with("name", name)
                .with("description", format!("{} description", name))
                .with("price", Decimal::new(1000, 2))
                .with("created_at", fixed_now()),
        );
        for &category in category_ids {
            t.link("products_categories", id, category);
        }
        id
    })
}

pub fn seed_privilege(store: &MemoryStore, name: &str) -> i64 {
    store.with_tables(|t| t.insert("privileges", Row::new().with("name", name)))
}

pub fn grant_privilege(store: &MemoryStore, role: i64, privilege: i64) {
    store.with_tables(|t| t.link("roles_privileges", role, privilege));
}

pub fn role_id(store: &MemoryStore, name: &str) -> i64 {
    store
        .with_tables(|t| find_where(t, "roles", "name", &SqlValue::from(name)))
        .and_then(|row| row.try_get::<i64>("id").ok())
        .expect("seeded role")
}

fn fault(message: impl Into<String>) -> StoreError {
    StoreError::Fault(message.into())
}

fn find_where(t: &Tables, table: &str, column: &str, value: &SqlValue) -> Option<Row> {
    t.scan(table).find(|row| row.get(column) == Some(value)).cloned()
}

fn remove_where(t: &mut Tables, table: &str, column: &str, id: i64) {
    let doomed: Vec<i64> = t
        .scan(table)
        .filter(|row| row.get(column) == Some(&SqlValue::BigInt(id)))
        .filter_map(|row| row.try_get::<i64>("id").ok())
        .collect();
    for id in doomed {
        t.remove(table, id);
    }
}

fn unique(t: &Tables, table: &str, column: &str, value: &SqlValue) -> Result<(), StoreError> {
    match find_where(t, table, column, value) {
        Some(_) => Err(fault(format!(
            "duplicate key value violates unique constraint on {}.{}",
            table, column
        ))),
        None => Ok(()),
    }
}

fn name_of(t: &Tables, table: &str, id: i64) -> Result<SqlValue, StoreError> {
    t.get(table, id)
        .and_then(|row| row.get("name").cloned())
        .ok_or_else(|| fault(format!("dangling reference {}.{}", table, id)))
}

fn names(t: &Tables, table: &str, ids: impl IntoIterator<Item = i64>) -> Result<Vec<String>, StoreError> {
    ids.into_iter()
        .map(|id| match name_of(t, table, id)? {
            SqlValue::Text(name) => Ok(name),
            other => Err(fault(format!("unexpected name {:?}", other))),
        })
        .collect()
}

/// `STRING_AGG` over an empty set is NULL.
fn string_agg(values: Vec<String>) -> SqlValue {
    if values.is_empty() {
        SqlValue::Null
    } else {
        SqlValue::Text(values.join(", "))
    }
}

fn exists_on(store: &MemoryStore, table: &'static str, column: &'static str) {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)", table, column);
    store.on(&sql, move |s, t| {
        let value = param(s, 0)?;
        Ok(Reply::exists(find_where(t, table, column, &value).is_some()))
    });
}

fn link_table(store: &MemoryStore, link: LinkTable) {
    store.on(&link.select_children_sql(), move |s, t| {
        let children = t.children(link.table, param_id(s, 0)?);
        Ok(Reply::Rows(
            children
                .into_iter()
                .map(|child| Row::new().with("child_id", child))
                .collect(),
        ))
    });
    store.on(&link.insert_sql(), move |s, t| {
        let added = t.link(link.table, param_id(s, 0)?, param_id(s, 1)?);
        if !added {
            return Err(fault(format!("duplicate key value in {}", link.table)));
        }
        Ok(Reply::affected(1))
    });
    store.on(&link.delete_sql(), move |s, t| {
        let removed = t.unlink(link.table, param_id(s, 0)?, param_id(s, 1)?);
        Ok(Reply::affected(u64::from(removed)))
    });
}

fn delete_on(store: &MemoryStore, table: &'static str, cascade: fn(&mut Tables, i64)) {
    store.on(&delete_sql(table), move |s, t| {
        let id = param_id(s, 0)?;
        match t.remove(table, id) {
            Some(_) => {
                cascade(t, id);
                Ok(Reply::affected(1))
            }
            None => Ok(Reply::affected(0)),
        }
    });
}

/// Applies `UPDATE <table> SET a = $1, b = NOW() WHERE id = $n` by reading
/// the assignment list back out of the statement text.
fn update_on(store: &MemoryStore, table: &'static str) {
    store.on(&format!("UPDATE {} SET ", table), move |s, t| {
        let assignments = s
            .sql()
            .split_once(" SET ")
            .and_then(|(_, rest)| rest.split_once(" WHERE "))
            .map(|(set, _)| set)
            .ok_or_else(|| fault(format!("malformed update: {}", s.sql())))?;
        let key = param_id(s, s.params().len().saturating_sub(1))?;

        let mut values = Vec::new();
        for clause in assignments.split(", ") {
            let (column, placeholder) = clause
                .split_once(" = ")
                .ok_or_else(|| fault(format!("malformed assignment: {}", clause)))?;
            let value = if placeholder == "NOW()" {
                SqlValue::Timestamp(fixed_now())
            } else {
                let index: usize = placeholder
                    .trim_start_matches('$')
                    .parse()
                    .map_err(|_| fault(format!("bad placeholder: {}", placeholder)))?;
                param(s, index - 1)?
            };
            values.push((column, value));
        }

        match t.get_mut(table, key) {
            Some(row) => {
                for (column, value) in values {
                    row.set(column, value);
                }
                Ok(Reply::affected(1))
            }
            None => Ok(Reply::affected(0)),
        }
    });
}

fn product_rows(t: &Tables, product: &Row) -> Result<Vec<Row>, StoreError> {
    let id: i64 = product.try_get("id")?;
    let base = Row::new()
        .with("product_id", id)
        .with("name", product.get("name").cloned().unwrap_or(SqlValue::Null))
        .with("description", product.get("description").cloned().unwrap_or(SqlValue::Null))
        .with("price", product.get("price").cloned().unwrap_or(SqlValue::Null))
        .with("created_at", product.get("created_at").cloned().unwrap_or(SqlValue::Null));

    let categories = t.children("products_categories", id);
    if categories.is_empty() {
        return Ok(vec![base
            .with("category_id", SqlValue::Null)
            .with("category_name", SqlValue::Null)]);
    }
    categories
        .into_iter()
        .map(|category| {
            Ok(base
                .clone()
                .with("category_id", category)
                .with("category_name", name_of(t, "categories", category)?))
        })
        .collect()
}

fn product_statements(store: &MemoryStore) {
    store.on(products::INSERT, |s, t| {
        let id = t.insert(
            "products",
            Row::new()
                .with("name", param(s, 0)?)
                .with("description", param(s, 1)?)
                .with("price", param(s, 2)?)
                .with("created_at", fixed_now()),
        );
        Ok(Reply::inserted(id))
    });
    store.on(products::FIND_BY_ID, |s, t| {
        let rows = match t.get("products", param_id(s, 0)?) {
            Some(product) => product_rows(t, product)?,
            None => Vec::new(),
        };
        Ok(Reply::Rows(rows))
    });
    store.on(products::FIND_PAGE, |s, t| {
        let limit = usize::try_from(param_id(s, 0)?).unwrap_or(0);
        let offset = usize::try_from(param_id(s, 1)?).unwrap_or(0);
        let mut rows = Vec::new();
        for product in t.scan("products").skip(offset).take(limit) {
            rows.extend(product_rows(t, product)?);
        }
        Ok(Reply::Rows(rows))
    });
}

fn named_statements(
    store: &MemoryStore,
    table: &'static str,
    insert: &'static str,
    find_by_id: &'static str,
    find_by_name: &'static str,
) {
    store.on(insert, move |s, t| {
        let name = param(s, 0)?;
        unique(t, table, "name", &name)?;
        Ok(Reply::inserted(t.insert(table, Row::new().with("name", name))))
    });
    store.on(find_by_id, move |s, t| {
        let id = param_id(s, 0)?;
        Ok(Reply::Rows(t.get(table, id).cloned().into_iter().collect()))
    });
    store.on(find_by_name, move |s, t| {
        let name = param(s, 0)?;
        Ok(Reply::Rows(find_where(t, table, "name", &name).into_iter().collect()))
    });
}

fn category_by_product(store: &MemoryStore) {
    store.on(categories::FIND_BY_PRODUCT, |s, t| {
        let rows = t
            .children("products_categories", param_id(s, 0)?)
            .into_iter()
            .filter_map(|category| t.get("categories", category).cloned())
            .collect();
        Ok(Reply::Rows(rows))
    });
}

fn inventory_statements(store: &MemoryStore) {
    store.on(inventory::INSERT, |s, t| {
        let id = t.insert(
            "inventory",
            Row::new()
                .with("product_id", param(s, 0)?)
                .with("location_id", param(s, 1)?)
                .with("quantity", param(s, 2)?)
                .with("updated_at", fixed_now()),
        );
        Ok(Reply::inserted(id))
    });
    store.on(inventory::FIND_BY_ID, |s, t| {
        let Some(record) = t.get("inventory", param_id(s, 0)?) else {
            return Ok(Reply::Rows(Vec::new()));
        };
        let product_id: i64 = record.try_get("product_id")?;
        let location_id: i64 = record.try_get("location_id")?;
        let (Some(product), Some(location)) =
            (t.get("products", product_id), t.get("locations", location_id))
        else {
            return Ok(Reply::Rows(Vec::new()));
        };
        let column = |row: &Row, name: &str| row.get(name).cloned().unwrap_or(SqlValue::Null);
        Ok(Reply::Rows(vec![Row::new()
            .with("id", column(record, "id"))
            .with("quantity", column(record, "quantity"))
            .with("updated_at", column(record, "updated_at"))
            .with("product_id", product_id)
            .with("product_name", column(product, "name"))
            .with("product_price", column(product, "price"))
            .with("product_created_at", column(product, "created_at"))
            .with("location_id", location_id)
            .with("location_name", column(location, "name"))]))
    });
}

fn supplier_statements(store: &MemoryStore) {
    store.on(suppliers::INSERT, |s, t| {
        let id = t.insert(
            "suppliers",
            Row::new()
                .with("name", param(s, 0)?)
                .with("contact_name", param(s, 1)?)
                .with("phone", param(s, 2)?)
                .with("email", param(s, 3)?)
                .with("address", param(s, 4)?)
                .with("created_at", fixed_now())
                .with("updated_at", SqlValue::Null),
        );
        Ok(Reply::inserted(id))
    });
    store.on(suppliers::FIND_BY_ID, |s, t| {
        let id = param_id(s, 0)?;
        Ok(Reply::Rows(t.get("suppliers", id).cloned().into_iter().collect()))
    });
    store.on(suppliers::FIND_PAGE, |s, t| {
        let limit = usize::try_from(param_id(s, 0)?).unwrap_or(0);
        let offset = usize::try_from(param_id(s, 1)?).unwrap_or(0);
        Ok(Reply::Rows(
            t.scan("suppliers").skip(offset).take(limit).cloned().collect(),
        ))
    });
}

fn role_rows(t: &Tables, role: &Row) -> Result<Vec<Row>, StoreError> {
    let id: i64 = role.try_get("id")?;
    let base = Row::new()
        .with("role_id", id)
        .with("role_name", role.get("name").cloned().unwrap_or(SqlValue::Null));
    let privileges = t.children("roles_privileges", id);
    if privileges.is_empty() {
        return Ok(vec![base
            .with("privilege_id", SqlValue::Null)
            .with("privilege_name", SqlValue::Null)]);
    }
    privileges
        .into_iter()
        .map(|privilege| {
            Ok(base
                .clone()
                .with("privilege_id", privilege)
                .with("privilege_name", name_of(t, "privileges", privilege)?))
        })
        .collect()
}

fn role_statements(store: &MemoryStore) {
    store.on(&roles::find_by_id_sql(), |s, t| {
        let rows = match t.get("roles", param_id(s, 0)?) {
            Some(role) => role_rows(t, role)?,
            None => Vec::new(),
        };
        Ok(Reply::Rows(rows))
    });
    store.on(&roles::find_by_name_sql(), |s, t| {
        let rows = match find_where(t, "roles", "name", &param(s, 0)?) {
            Some(role) => role_rows(t, &role)?,
            None => Vec::new(),
        };
        Ok(Reply::Rows(rows))
    });
}

fn account_rows(t: &Tables, statement: &Statement) -> Result<Vec<Row>, StoreError> {
    let Some(user) = t.get("users", param_id(statement, 0)?) else {
        return Ok(Vec::new());
    };
    let id: i64 = user.try_get("id")?;
    let column = |name: &str| user.get(name).cloned().unwrap_or(SqlValue::Null);
    let base = Row::new()
        .with("user_id", id)
        .with("username", column("username"))
        .with("email", column("email"))
        .with("password", column("password"))
        .with("created_at", column("created_at"));

    let roles = t.children("users_roles", id);
    if roles.is_empty() {
        return Ok(vec![base
            .with("role_id", SqlValue::Null)
            .with("role_name", SqlValue::Null)
            .with("role_privileges", SqlValue::Null)]);
    }
    roles
        .into_iter()
        .map(|role| {
            let privileges = names(t, "privileges", t.children("roles_privileges", role))?;
            Ok(base
                .clone()
                .with("role_id", role)
                .with("role_name", name_of(t, "roles", role)?)
                .with("role_privileges", string_agg(privileges)))
        })
        .collect()
}

fn account_statements(store: &MemoryStore) {
    store.on(accounts::EXISTS_BY_USERNAME_OR_EMAIL, |s, t| {
        let (username, email) = (param(s, 0)?, param(s, 1)?);
        let taken = t.scan("users").any(|row| {
            row.get("username") == Some(&username) || row.get("email") == Some(&email)
        });
        Ok(Reply::exists(taken))
    });
    store.on(accounts::INSERT, |s, t| {
        let (username, email) = (param(s, 0)?, param(s, 1)?);
        unique(t, "users", "username", &username)?;
        unique(t, "users", "email", &email)?;
        let id = t.insert(
            "users",
            Row::new()
                .with("username", username)
                .with("email", email)
                .with("password", param(s, 2)?)
                .with("created_at", fixed_now()),
        );
        Ok(Reply::inserted(id))
    });
    store.on(accounts::LINK_ROLE_BY_NAME, |s, t| {
        let user = param_id(s, 0)?;
        let role = find_where(t, "roles", "name", &param(s, 1)?)
            .map(|row| row.try_get::<i64>("id"))
            .transpose()?;
        match role {
            Some(role) => {
                t.link("users_roles", user, role);
                Ok(Reply::affected(1))
            }
            None => Ok(Reply::affected(0)),
        }
    });
    store.on(accounts::FIND_BY_ID, |s, t| Ok(Reply::Rows(account_rows(t, s)?)));
    store.on(accounts::FIND_PRINCIPAL, |s, t| {
        let Some(user) = find_where(t, "users", "username", &param(s, 0)?) else {
            return Ok(Reply::Rows(Vec::new()));
        };
        let id: i64 = user.try_get("id")?;
        let roles = t.children("users_roles", id);
        let privileges: BTreeSet<i64> = roles
            .iter()
            .flat_map(|&role| t.children("roles_privileges", role))
            .collect();

        // DISTINCT aggregates come back sorted
        let mut role_names = names(t, "roles", roles)?;
        role_names.sort();
        role_names.dedup();
        let mut privilege_names = names(t, "privileges", privileges)?;
        privilege_names.sort();
        privilege_names.dedup();

        Ok(Reply::Rows(vec![Row::new()
            .with("user_id", id)
            .with("username", user.get("username").cloned().unwrap_or(SqlValue::Null))
            .with("password", user.get("password").cloned().unwrap_or(SqlValue::Null))
            .with("roles", string_agg(role_names))
            .with("privileges", string_agg(privilege_names))]))
    });
}
