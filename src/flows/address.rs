//! Saved shipping addresses.
//!
//! The list is owned by the server; every change is followed by a fresh
//! load so the page never shows an address the server does not have.

use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use super::fallback_for;
use crate::api::Ack;
use crate::page::PageContext;
use crate::surface::lock;
use crate::{Result, StorefrontError};

pub const LIST_PATH: &str = "/checkout/addresses";
pub const ADD_PATH: &str = "/profile/add/address";
pub const EDIT_PATH: &str = "/profile/edit/address";
pub const DELETE_PATH: &str = "/profile/delete/address";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Address {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, rename = "user_firstname")]
    pub first_name: String,
    #[serde(default, rename = "user_lastname")]
    pub last_name: String,
    #[serde(default, rename = "user_address")]
    pub line: String,
    #[serde(default, rename = "user_city")]
    pub city: String,
    #[serde(default, rename = "user_state")]
    pub state: String,
    #[serde(default, rename = "user_pincode")]
    pub pincode: String,
    #[serde(default, rename = "user_country")]
    pub country: String,
    #[serde(default, rename = "user_landmark")]
    pub landmark: String,
    #[serde(default, rename = "user_number")]
    pub phone: String,
}

#[derive(Debug, Deserialize)]
struct AddressList {
    #[serde(default)]
    status: String,
    #[serde(default, rename = "Addresses")]
    addresses: Vec<Address>,
}

/// The add and edit address forms.
#[derive(Clone, Debug, Default, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
    #[validate(custom = "required")]
    pub first_name: String,
    pub last_name: String,
    #[validate(custom = "required")]
    pub phone_number: String,
    #[validate(custom = "required")]
    pub address: String,
    pub landmark: String,
    #[validate(custom = "required")]
    pub city: String,
    #[validate(custom = "required")]
    pub state: String,
    #[validate(custom = "required")]
    pub country: String,
    #[validate(custom = "required")]
    pub zip_code: String,
}

fn required(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(Cow::Borrowed("Please fill in all required address fields"));
        return Err(err);
    }
    Ok(())
}

impl AddressForm {
    fn check(&self) -> Result<()> {
        match self.validate() {
            Ok(()) => Ok(()),
            Err(errors) => {
                let message = errors
                    .field_errors()
                    .values()
                    .flat_map(|errs| errs.iter())
                    .find_map(|e| e.message.as_deref().map(str::to_string))
                    .unwrap_or_else(|| errors.to_string());
                Err(StorefrontError::Invalid(message))
            }
        }
    }
}

#[derive(Serialize)]
struct EditRequest<'a> {
    id: String,
    #[serde(flatten)]
    form: &'a AddressForm,
}

#[derive(Default)]
struct BookState {
    addresses: Vec<Address>,
    selected: Option<u64>,
}

pub struct AddressBook {
    ctx: Arc<PageContext>,
    state: Mutex<BookState>,
}

impl AddressBook {
    pub fn new(ctx: Arc<PageContext>) -> Self {
        Self { ctx, state: Mutex::new(BookState::default()) }
    }

    pub fn addresses(&self) -> Vec<Address> { lock(&self.state).addresses.clone() }
    pub fn selected(&self) -> Option<u64> { lock(&self.state).selected }

    pub fn select(&self, id: u64) -> bool {
        let mut state = lock(&self.state);
        if state.addresses.iter().any(|a| a.id == id) {
            state.selected = Some(id);
            true
        } else {
            false
        }
    }

    /// Loads the saved addresses. The default address wins, then the current
    /// choice if it survived, then the first address.
    pub async fn load(&self) -> Result<Vec<Address>> {
        let list = match self.ctx.api.post_empty::<AddressList>(LIST_PATH).await {
            Ok(list) => list,
            Err(e) => {
                self.ctx.report(&e, "Failed to load addresses");
                return Err(e);
            }
        };
        if list.status != "Success" {
            warn!(status = %list.status, "address list not returned");
            return Ok(Vec::new());
        }

        let mut state = lock(&self.state);
        let kept = state.selected.filter(|id| list.addresses.iter().any(|a| a.id == *id));
        state.selected = list
            .addresses
            .iter()
            .find(|a| a.is_default)
            .map(|a| a.id)
            .or(kept)
            .or(list.addresses.first().map(|a| a.id));
        state.addresses = list.addresses.clone();
        Ok(list.addresses)
    }

    pub async fn add(&self, form: &AddressForm) -> Result<()> {
        self.check(form)?;
        let sent = self.ctx.api.post_json::<_, Ack>(ADD_PATH, form).await;
        self.finish(sent, "Address added successfully", "Failed to add address").await
    }

    pub async fn edit(&self, id: u64, form: &AddressForm) -> Result<()> {
        self.check(form)?;
        let request = EditRequest { id: id.to_string(), form };
        let sent = self.ctx.api.patch_json::<_, Ack>(EDIT_PATH, &request).await;
        self.finish(sent, "Address updated successfully", "Failed to update address").await
    }

    /// Deletes without asking; the page confirms with the user first.
    pub async fn delete(&self, id: u64) -> Result<()> {
        let sent = self.ctx.api.delete(&format!("{DELETE_PATH}/{id}")).await;
        self.finish(sent, "Address deleted successfully", "Failed to delete address").await
    }

    fn check(&self, form: &AddressForm) -> Result<()> {
        form.check().inspect_err(|e| self.ctx.report(e, ""))
    }

    async fn finish(&self, sent: Result<Ack>, done: &str, failed: &str) -> Result<()> {
        match sent {
            Ok(_) => {
                info!(done, "address book changed");
                self.ctx.notifier.success(done);
                // A failed reload reports itself; the change already happened.
                let _ = self.load().await;
                Ok(())
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, failed));
                Err(e)
            }
        }
    }
}
