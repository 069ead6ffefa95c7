use chrono::Utc;
use sea_orm::*;
use tracing::info;

use crate::database::entities::{stage_templates, StageKind};
use crate::stage_data::{CustomFieldDef, CustomFieldDefs, CustomFieldType, KeyList};

struct DefaultStage {
    name: &'static str,
    checklist: &'static [&'static str],
    substages: &'static [&'static str],
    custom_fields: &'static [(&'static str, &'static str, CustomFieldType)],
}

/// Pipeline every new company starts with, in position order
const DEFAULT_CATALOG: &[DefaultStage] = &[
    DefaultStage {
        name: "Render",
        checklist: &[],
        substages: &[],
        custom_fields: &[],
    },
    DefaultStage {
        name: "3D Model",
        checklist: &[],
        substages: &[],
        custom_fields: &[],
    },
    DefaultStage {
        name: "Factory Proposal",
        checklist: &["factory_shortlist", "capability_check", "factory_selected"],
        substages: &[],
        custom_fields: &[],
    },
    DefaultStage {
        name: "Quotation",
        checklist: &["quote_requested", "quote_received", "price_approved"],
        substages: &[],
        custom_fields: &[
            ("unit_price", "Unit price", CustomFieldType::Number),
            ("moq", "Minimum order quantity", CustomFieldType::Number),
        ],
    },
    DefaultStage {
        name: "Contract",
        checklist: &["draft_sent", "terms_agreed", "contract_signed"],
        substages: &[],
        custom_fields: &[("payment_terms", "Payment terms", CustomFieldType::Textarea)],
    },
    DefaultStage {
        name: "Sample Production",
        checklist: &["sample_ordered", "sample_shipped", "sample_received"],
        substages: &[],
        custom_fields: &[],
    },
    DefaultStage {
        name: "Sample Approval",
        checklist: &["fit_check", "material_check", "sample_approved"],
        substages: &[],
        custom_fields: &[("sample_feedback", "Feedback", CustomFieldType::Textarea)],
    },
    DefaultStage {
        name: "Certification",
        checklist: &[],
        substages: &["declaration_of_conformity", "certificate_of_conformity", "test_report"],
        custom_fields: &[("certificate_number", "Certificate number", CustomFieldType::Text)],
    },
    DefaultStage {
        name: "Mass Production",
        checklist: &["deposit_paid", "materials_ready", "production_started", "production_finished"],
        substages: &[],
        custom_fields: &[],
    },
    DefaultStage {
        name: "Quality Inspection",
        checklist: &["inspection_booked", "inspection_passed"],
        substages: &[],
        custom_fields: &[("defect_rate", "Defect rate (%)", CustomFieldType::Number)],
    },
    DefaultStage {
        name: "Shipment",
        checklist: &["balance_paid", "cargo_booked", "cargo_departed", "cargo_arrived"],
        substages: &[],
        custom_fields: &[("tracking_number", "Tracking number", CustomFieldType::Text)],
    },
    DefaultStage {
        name: "Customs Clearance",
        checklist: &["documents_submitted", "duties_paid", "released"],
        substages: &[],
        custom_fields: &[],
    },
    DefaultStage {
        name: "Distribution Preparation",
        checklist: &["barcodes_printed", "listing_created", "warehouse_delivery"],
        substages: &[],
        custom_fields: &[],
    },
];

pub fn default_catalog_len() -> usize {
    DEFAULT_CATALOG.len()
}

fn key_list(keys: &[&str]) -> Option<KeyList> {
    if keys.is_empty() {
        None
    } else {
        Some(KeyList(keys.iter().map(|k| k.to_string()).collect()))
    }
}

/// Seed the default pipeline for a company whose registry is still empty.
/// Returns the number of templates created (0 when the company already has any).
pub async fn seed_default_templates<C: ConnectionTrait>(db: &C, company_id: i32) -> Result<usize, DbErr> {
    let existing = stage_templates::Entity::find()
        .filter(stage_templates::Column::CompanyId.eq(company_id))
        .count(db)
        .await?;

    if existing > 0 {
        info!(
            "Company {} already has {} templates, skipping default catalog",
            company_id, existing
        );
        return Ok(0);
    }

    let now = Utc::now();
    let templates = DEFAULT_CATALOG
        .iter()
        .enumerate()
        .map(|(index, stage)| {
            let custom_fields = if stage.custom_fields.is_empty() {
                None
            } else {
                Some(CustomFieldDefs(
                    stage
                        .custom_fields
                        .iter()
                        .enumerate()
                        .map(|(i, (key, label, field_type))| CustomFieldDef {
                            key: key.to_string(),
                            label: label.to_string(),
                            field_type: *field_type,
                            position: i as i32 + 1,
                        })
                        .collect(),
                ))
            };

            stage_templates::ActiveModel {
                company_id: Set(company_id),
                name: Set(stage.name.to_string()),
                name_translations: Set(None),
                kind: Set(StageKind::from_name(stage.name)),
                position: Set(index as i32 + 1),
                has_checklist: Set(!stage.checklist.is_empty()),
                checklist_items: Set(key_list(stage.checklist)),
                has_conditional_substages: Set(!stage.substages.is_empty()),
                conditional_substages: Set(key_list(stage.substages)),
                custom_fields: Set(custom_fields),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
        })
        .collect::<Vec<_>>();

    let count = templates.len();
    stage_templates::Entity::insert_many(templates).exec(db).await?;

    info!("Seeded {} default stage templates for company {}", count, company_id);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities::companies;
    use crate::database::test_utils::setup_test_db;

    async fn seed_company(db: &DatabaseConnection) -> companies::Model {
        companies::ActiveModel {
            name: Set("Acme Sourcing".to_string()),
            logo_url: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert company")
    }

    #[tokio::test]
    async fn seeds_thirteen_ordered_templates_once() {
        let db = setup_test_db().await;
        let company = seed_company(&db).await;

        assert_eq!(seed_default_templates(&db, company.id).await.unwrap(), 13);
        assert_eq!(seed_default_templates(&db, company.id).await.unwrap(), 0);

        let templates = stage_templates::Entity::find()
            .filter(stage_templates::Column::CompanyId.eq(company.id))
            .order_by_asc(stage_templates::Column::Position)
            .all(&db)
            .await
            .unwrap();

        assert_eq!(templates.len(), default_catalog_len());
        assert_eq!(templates[0].name, "Render");
        assert_eq!(templates[0].position, 1);
        assert_eq!(templates[0].kind, StageKind::Render);
        assert!(!templates[0].has_checklist);
        assert_eq!(templates[1].kind, StageKind::Model3d);
        assert_eq!(templates[3].kind, StageKind::Quotation);
        assert_eq!(templates.last().unwrap().name, "Distribution Preparation");
    }
}
