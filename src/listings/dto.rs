use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// The fixed set of property categories a listing may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Villa,
    Flat,
    Land,
    #[serde(rename = "Mobile Home")]
    MobileHome,
    Bungalow,
    Condo,
    Penthouse,
    Watch,
}

impl PropertyType {
    pub const ALL: [PropertyType; 8] = [
        PropertyType::Villa,
        PropertyType::Flat,
        PropertyType::Land,
        PropertyType::MobileHome,
        PropertyType::Bungalow,
        PropertyType::Condo,
        PropertyType::Penthouse,
        PropertyType::Watch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Villa => "Villa",
            PropertyType::Flat => "Flat",
            PropertyType::Land => "Land",
            PropertyType::MobileHome => "Mobile Home",
            PropertyType::Bungalow => "Bungalow",
            PropertyType::Condo => "Condo",
            PropertyType::Penthouse => "Penthouse",
            PropertyType::Watch => "Watch",
        }
    }
}

impl FromStr for PropertyType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-string filters; every field optional, combined with AND.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub max_price: Option<i64>,
    pub location: Option<String>,
    pub nearby: Option<String>,
    pub property_type: Option<PropertyType>,
}

/// Fully validated input for a new listing.
#[derive(Debug)]
pub struct NewListing {
    pub title: String,
    pub price: i64,
    pub location: String,
    pub rooms: i32,
    pub bathrooms: i32,
    pub nearby: String,
    pub description: String,
    pub contact_email: String,
    pub contact_number: String,
    pub property_type: PropertyType,
    pub owner_id: Uuid,
}

/// Partial update; `None` leaves the stored field untouched. The image is
/// handled separately so an absent upload can never null the stored key.
#[derive(Debug, Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub price: Option<i64>,
    pub location: Option<String>,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub nearby: Option<String>,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_number: Option<String>,
    pub property_type: Option<PropertyType>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.price.is_none()
            && self.location.is_none()
            && self.rooms.is_none()
            && self.bathrooms.is_none()
            && self.nearby.is_none()
            && self.description.is_none()
            && self.contact_email.is_none()
            && self.contact_number.is_none()
            && self.property_type.is_none()
    }
}

fn parse_price(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|p| *p >= 0)
        .ok_or_else(|| ApiError::validation("price must be a non-negative number"))
}

fn parse_count(raw: &str, name: &str) -> Result<i32, ApiError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| ApiError::validation(format!("{name} must be a non-negative integer")))
}

fn parse_property_type(raw: &str) -> Result<PropertyType, ApiError> {
    raw.trim()
        .parse::<PropertyType>()
        .map_err(|_| ApiError::validation("Invalid property type"))
}

/// Text fields of the create-listing multipart body, collected by name.
#[derive(Debug, Default)]
pub struct CreateListingForm {
    title: Option<String>,
    price: Option<String>,
    location: Option<String>,
    rooms: Option<String>,
    bathrooms: Option<String>,
    nearby: Option<String>,
    description: Option<String>,
    contact_email: Option<String>,
    contact_number: Option<String>,
    property_type: Option<String>,
    posted_by: Option<String>,
}

impl CreateListingForm {
    pub fn from_fields(fields: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (name, value) in fields {
            match name.as_str() {
                "title" => form.title = Some(value),
                "price" => form.price = Some(value),
                "location" => form.location = Some(value),
                "rooms" => form.rooms = Some(value),
                "bathrooms" => form.bathrooms = Some(value),
                "nearby" => form.nearby = Some(value),
                "description" => form.description = Some(value),
                "contactEmail" => form.contact_email = Some(value),
                "contactNumber" => form.contact_number = Some(value),
                "propertyType" => form.property_type = Some(value),
                "postedBy" => form.posted_by = Some(value),
                _ => {}
            }
        }
        form
    }

    pub fn finish(self) -> Result<NewListing, ApiError> {
        fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
            field
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::validation(format!("{name} is required")))
        }

        let price = parse_price(&required(self.price, "price")?)?;
        let rooms = parse_count(&required(self.rooms, "rooms")?, "rooms")?;
        let bathrooms = parse_count(&required(self.bathrooms, "bathrooms")?, "bathrooms")?;
        let property_type = parse_property_type(&required(self.property_type, "propertyType")?)?;
        let owner_id = required(self.posted_by, "postedBy")?
            .parse::<Uuid>()
            .map_err(|_| ApiError::validation("postedBy must be a user id"))?;

        Ok(NewListing {
            title: required(self.title, "title")?,
            price,
            location: required(self.location, "location")?,
            rooms,
            bathrooms,
            nearby: required(self.nearby, "nearby")?,
            description: required(self.description, "description")?,
            contact_email: required(self.contact_email, "contactEmail")?,
            contact_number: required(self.contact_number, "contactNumber")?,
            property_type,
            owner_id,
        })
    }
}

/// Text fields of the update multipart body; everything optional.
#[derive(Debug, Default)]
pub struct UpdateListingForm {
    fields: CreateListingForm,
}

impl UpdateListingForm {
    pub fn from_fields(fields: Vec<(String, String)>) -> Self {
        Self {
            fields: CreateListingForm::from_fields(fields),
        }
    }

    pub fn finish(self) -> Result<ListingPatch, ApiError> {
        let f = self.fields;
        Ok(ListingPatch {
            title: f.title,
            price: f.price.as_deref().map(parse_price).transpose()?,
            location: f.location,
            rooms: f
                .rooms
                .as_deref()
                .map(|r| parse_count(r, "rooms"))
                .transpose()?,
            bathrooms: f
                .bathrooms
                .as_deref()
                .map(|b| parse_count(b, "bathrooms"))
                .transpose()?,
            nearby: f.nearby,
            description: f.description,
            contact_email: f.contact_email,
            contact_number: f.contact_number,
            property_type: f
                .property_type
                .as_deref()
                .map(parse_property_type)
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> Vec<(String, String)> {
        [
            ("title", "Sea-view villa"),
            ("price", "450000"),
            ("location", "Valencia"),
            ("rooms", "4"),
            ("bathrooms", "2"),
            ("nearby", "beach, school"),
            ("description", "Bright and quiet"),
            ("contactEmail", "owner@x.com"),
            ("contactNumber", "+34600000000"),
            ("propertyType", "Villa"),
            ("postedBy", "7f1aee0e-95e8-4aa5-a1d5-6c7b8f3a0f11"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn every_property_type_round_trips() {
        for t in PropertyType::ALL {
            assert_eq!(t.as_str().parse::<PropertyType>(), Ok(t));
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn unknown_property_type_is_rejected() {
        assert!("Castle".parse::<PropertyType>().is_err());
        assert!("villa".parse::<PropertyType>().is_err());
        assert!(serde_json::from_str::<PropertyType>("\"Castle\"").is_err());
    }

    #[test]
    fn mobile_home_carries_its_space() {
        assert_eq!(PropertyType::MobileHome.as_str(), "Mobile Home");
        let parsed: PropertyType = serde_json::from_str("\"Mobile Home\"").unwrap();
        assert_eq!(parsed, PropertyType::MobileHome);
    }

    #[test]
    fn create_form_accepts_a_complete_body() {
        let new = CreateListingForm::from_fields(full_form()).finish().unwrap();
        assert_eq!(new.title, "Sea-view villa");
        assert_eq!(new.price, 450000);
        assert_eq!(new.rooms, 4);
        assert_eq!(new.property_type, PropertyType::Villa);
    }

    #[test]
    fn create_form_rejects_a_missing_field() {
        let fields: Vec<_> = full_form()
            .into_iter()
            .filter(|(k, _)| k != "location")
            .collect();
        let err = CreateListingForm::from_fields(fields).finish().unwrap_err();
        assert!(err.to_string().contains("location is required"));
    }

    #[test]
    fn create_form_rejects_negative_price() {
        let mut fields = full_form();
        fields.iter_mut().find(|(k, _)| k == "price").unwrap().1 = "-5".into();
        assert!(CreateListingForm::from_fields(fields).finish().is_err());
    }

    #[test]
    fn create_form_rejects_bad_property_type() {
        let mut fields = full_form();
        fields
            .iter_mut()
            .find(|(k, _)| k == "propertyType")
            .unwrap()
            .1 = "Treehouse".into();
        let err = CreateListingForm::from_fields(fields).finish().unwrap_err();
        assert!(err.to_string().contains("Invalid property type"));
    }

    #[test]
    fn update_form_keeps_absent_fields_absent() {
        let fields = vec![("price".to_string(), "500000".to_string())];
        let patch = UpdateListingForm::from_fields(fields).finish().unwrap();
        assert_eq!(patch.price, Some(500000));
        assert!(patch.title.is_none());
        assert!(patch.property_type.is_none());
        assert!(!patch.is_empty());
    }

    #[test]
    fn empty_update_form_yields_empty_patch() {
        let patch = UpdateListingForm::from_fields(Vec::new()).finish().unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn filter_deserializes_from_camel_case() {
        let f: ListingFilter =
            serde_json::from_str(r#"{"maxPrice": 300000, "propertyType": "Flat"}"#).unwrap();
        assert_eq!(f.max_price, Some(300000));
        assert_eq!(f.property_type, Some(PropertyType::Flat));
        assert!(f.rooms.is_none());
    }
}
