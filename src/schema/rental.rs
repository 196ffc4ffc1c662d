//! The canonical video-rental schema.

use super::{AttrType, Attribute, EntityDef, EntityKind, FkAction, SchemaRegistry};

fn id(name: &str) -> Attribute {
    Attribute::new(name, AttrType::Serial).primary_key()
}

fn fk(name: &str, target: EntityKind, target_attr: &str) -> Attribute {
    Attribute::new(name, AttrType::Integer)
        .not_null()
        .references(target, target_attr, FkAction::NoAction)
}

fn name_col(name: &str, len: u16) -> Attribute {
    Attribute::new(name, AttrType::VarChar(len)).not_null()
}

/// Build the rental schema registry.
///
/// Entities are declared in dependency order. The two mutual references
/// (store manager and a customer's latest rental) are deferred nullable keys.
pub fn rental_schema() -> SchemaRegistry {
    SchemaRegistry::new()
        .entity(
            EntityDef::new(EntityKind::Country)
                .attribute(id("country_id"))
                .attribute(name_col("name", 50).unique())
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::City)
                .attribute(id("city_id"))
                .attribute(name_col("name", 50).unique())
                .attribute(fk("country_id", EntityKind::Country, "country_id"))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Address)
                .attribute(id("address_id"))
                .attribute(name_col("address", 50))
                .attribute(Attribute::new("address2", AttrType::VarChar(50)).unique())
                .attribute(name_col("district", 20))
                .attribute(Attribute::new("postal_code", AttrType::VarChar(10)))
                .attribute(name_col("phone", 20))
                .attribute(fk("city_id", EntityKind::City, "city_id"))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Language)
                .attribute(id("language_id"))
                .attribute(name_col("name", 20).unique())
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Category)
                .attribute(id("category_id"))
                .attribute(name_col("name", 25).unique())
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Actor)
                .attribute(id("actor_id"))
                .attribute(name_col("first_name", 45))
                .attribute(name_col("last_name", 45))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Film)
                .attribute(id("film_id"))
                .attribute(name_col("title", 255).unique())
                .attribute(Attribute::new("description", AttrType::Text))
                .attribute(Attribute::new("release_year", AttrType::Integer))
                .attribute(Attribute::new("rental_duration", AttrType::Integer).not_null())
                .attribute(Attribute::new("rental_rate", AttrType::Decimal(4, 2)).not_null())
                .attribute(Attribute::new("length", AttrType::Integer))
                .attribute(
                    Attribute::new("replacement_cost", AttrType::Decimal(5, 2)).not_null(),
                )
                .attribute(Attribute::new("rating", AttrType::Integer))
                .attribute(Attribute::new("special_features", AttrType::Text))
                .attribute(Attribute::new("fulltext", AttrType::Text))
                .attribute(fk("language_id", EntityKind::Language, "language_id"))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::FilmCategory)
                .attribute(
                    Attribute::new("film_id", AttrType::Integer)
                        .primary_key()
                        .references(EntityKind::Film, "film_id", FkAction::Cascade),
                )
                .attribute(
                    Attribute::new("category_id", AttrType::Integer)
                        .primary_key()
                        .references(EntityKind::Category, "category_id", FkAction::Cascade),
                ),
        )
        .entity(
            EntityDef::new(EntityKind::FilmActor)
                .attribute(
                    Attribute::new("film_id", AttrType::Integer)
                        .primary_key()
                        .references(EntityKind::Film, "film_id", FkAction::NoAction),
                )
                .attribute(
                    Attribute::new("actor_id", AttrType::Integer)
                        .primary_key()
                        .references(EntityKind::Actor, "actor_id", FkAction::NoAction),
                ),
        )
        .entity(
            EntityDef::new(EntityKind::Store)
                .attribute(id("store_id"))
                .attribute(
                    Attribute::new("manager_staff_id", AttrType::Integer)
                        .references(EntityKind::Staff, "staff_id", FkAction::NoAction)
                        .deferred(),
                )
                .attribute(fk("address_id", EntityKind::Address, "address_id"))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Staff)
                .attribute(id("staff_id"))
                .attribute(name_col("first_name", 45))
                .attribute(name_col("last_name", 45))
                .attribute(fk("address_id", EntityKind::Address, "address_id"))
                .attribute(fk("store_id", EntityKind::Store, "store_id"))
                .attribute(Attribute::new("active", AttrType::Boolean).not_null())
                .attribute(name_col("username", 40).unique())
                .attribute(name_col("password", 40).unique())
                .attribute(Attribute::new("picture", AttrType::Blob))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Customer)
                .attribute(id("customer_id"))
                .attribute(fk("store_id", EntityKind::Store, "store_id"))
                .attribute(name_col("first_name", 45))
                .attribute(name_col("last_name", 45))
                .attribute(name_col("email", 50).unique())
                .attribute(fk("address_id", EntityKind::Address, "address_id"))
                .attribute(Attribute::new("active", AttrType::Boolean).not_null())
                .attribute(Attribute::new("create_date", AttrType::Date).not_null())
                .attribute(
                    Attribute::new("last_rental_id", AttrType::Integer)
                        .references(EntityKind::Rental, "rental_id", FkAction::NoAction)
                        .deferred(),
                )
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Inventory)
                .attribute(id("inventory_id"))
                .attribute(fk("film_id", EntityKind::Film, "film_id"))
                .attribute(fk("store_id", EntityKind::Store, "store_id"))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Rental)
                .attribute(id("rental_id"))
                .attribute(Attribute::new("rental_date", AttrType::Timestamp).not_null())
                .attribute(fk("inventory_id", EntityKind::Inventory, "inventory_id"))
                .attribute(fk("customer_id", EntityKind::Customer, "customer_id"))
                .attribute(Attribute::new("return_date", AttrType::Timestamp))
                .attribute(fk("staff_id", EntityKind::Staff, "staff_id"))
                .timestamps(),
        )
        .entity(
            EntityDef::new(EntityKind::Payment)
                .attribute(id("payment_id"))
                .attribute(fk("customer_id", EntityKind::Customer, "customer_id"))
                .attribute(fk("staff_id", EntityKind::Staff, "staff_id"))
                .attribute(fk("rental_id", EntityKind::Rental, "rental_id"))
                .attribute(Attribute::new("amount", AttrType::Decimal(5, 2)).not_null())
                .attribute(Attribute::new("payment_date", AttrType::Timestamp).not_null())
                .timestamps(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_entities_registered_in_order() {
        let registry = rental_schema();
        assert_eq!(registry.kinds(), EntityKind::ALL.to_vec());
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_deferred_edges() {
        let registry = rental_schema();
        let deferred: Vec<(EntityKind, String, EntityKind)> = registry
            .deferred_edges()
            .into_iter()
            .map(|e| (e.child, e.attribute, e.parent))
            .collect();
        assert_eq!(
            deferred,
            vec![
                (EntityKind::Store, "manager_staff_id".to_string(), EntityKind::Staff),
                (EntityKind::Customer, "last_rental_id".to_string(), EntityKind::Rental),
            ]
        );
    }

    #[test]
    fn test_junctions() {
        let registry = rental_schema();
        let junctions: Vec<EntityKind> = registry
            .iter()
            .filter(|d| d.is_junction())
            .map(|d| d.kind)
            .collect();
        assert_eq!(junctions, vec![EntityKind::FilmCategory, EntityKind::FilmActor]);
    }

    #[test]
    fn test_unique_sets() {
        let registry = rental_schema();

        let staff = registry.get(EntityKind::Staff).unwrap();
        let names: Vec<String> = staff.unique_sets().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["username", "password"]);

        let film_category = registry.get(EntityKind::FilmCategory).unwrap();
        let names: Vec<String> = film_category
            .unique_sets()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["film_id+category_id"]);
    }
}
