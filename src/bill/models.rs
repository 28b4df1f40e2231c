use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::image::InlineImage;

/// Reserved placeholder name for the optional inline image.
pub const IMAGE_KEY: &str = "image";

/// Field values for one rent bill. All values are pre-formatted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct BillRequest {
    #[schema(example = "MAY")]
    pub month: String,
    pub owner_name: String,
    pub owner_aadhar: String,
    pub owner_acc: String,
    pub renter_name: String,
    pub sr_no: String,
    pub date: String,
    pub mobile: String,
    #[schema(example = "1,32,069")]
    pub monthly_rent: String,
    pub increment: String,
    pub total_after_increment: String,
    pub tds_amount: String,
    pub amount_paid: String,
    /// Base64-encoded PNG/JPEG; a `data:` URL prefix is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

impl BillRequest {
    /// Placeholder name and value for every text field, in template order.
    pub fn fields(&self) -> [(&'static str, &str); 13] {
        [
            ("month", self.month.as_str()),
            ("owner_name", self.owner_name.as_str()),
            ("owner_aadhar", self.owner_aadhar.as_str()),
            ("owner_acc", self.owner_acc.as_str()),
            ("renter_name", self.renter_name.as_str()),
            ("sr_no", self.sr_no.as_str()),
            ("date", self.date.as_str()),
            ("mobile", self.mobile.as_str()),
            ("monthly_rent", self.monthly_rent.as_str()),
            ("increment", self.increment.as_str()),
            ("total_after_increment", self.total_after_increment.as_str()),
            ("tds_amount", self.tds_amount.as_str()),
            ("amount_paid", self.amount_paid.as_str()),
        ]
    }

    /// The reference payload used by the `send-bill` client.
    pub fn sample() -> Self {
        Self {
            month: "MAY".to_string(),
            owner_name: "Sandeep Balkrishna Patil".to_string(),
            owner_aadhar: "2376 1617 3534".to_string(),
            owner_acc: "020301541637".to_string(),
            renter_name: "Sudhir Power Limited".to_string(),
            sr_no: "36".to_string(),
            date: "02/05/2025".to_string(),
            mobile: "7355556255".to_string(),
            monthly_rent: "1,32,069".to_string(),
            increment: "5% = 6603.45".to_string(),
            total_after_increment: "1,38,672.45".to_string(),
            tds_amount: "13,867".to_string(),
            amount_paid: "1,24,805".to_string(),
            image_base64: None,
        }
    }
}

/// Placeholder values for a single render.
#[derive(Debug, Default)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
    image: Option<InlineImage>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set_image(&mut self, image: InlineImage) {
        self.image = Some(image);
    }

    pub fn image(&self) -> Option<&InlineImage> {
        self.image.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<&BillRequest> for RenderContext {
    fn from(request: &BillRequest) -> Self {
        let mut context = Self::new();
        for (key, value) in request.fields() {
            context.insert(key, value);
        }
        context
    }
}
