use axum::Json;
use serde::Serialize;

use crate::error::ApiResponse;
use crate::models::{Objetivo, Situacao, VistoriaForm};
use crate::wizard::Step;

#[derive(Debug, Serialize)]
pub struct StepInfo {
    pub number: u8,
    pub step: Step,
    pub title: &'static str,
    pub fields: Vec<&'static str>,
    pub last: bool,
}

#[derive(Debug, Serialize)]
pub struct OptionInfo<T> {
    pub value: T,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FormDefinition {
    pub steps: Vec<StepInfo>,
    pub objetivos: Vec<OptionInfo<Objetivo>>,
    pub situacoes: Vec<OptionInfo<Situacao>>,
}

fn steps_for(form: &VistoriaForm) -> Vec<StepInfo> {
    Step::ALL
        .iter()
        .map(|step| StepInfo {
            number: step.number(),
            step: *step,
            title: step.title(),
            fields: step.fields(form),
            last: step.is_last(),
        })
        .collect()
}

fn definition(form: &VistoriaForm) -> FormDefinition {
    FormDefinition {
        steps: steps_for(form),
        objetivos: Objetivo::ALL
            .iter()
            .map(|o| OptionInfo {
                value: *o,
                label: o.label(),
            })
            .collect(),
        situacoes: Situacao::ALL
            .iter()
            .map(|s| OptionInfo {
                value: *s,
                label: s.label(),
            })
            .collect(),
    }
}

/// Wizard definition for an empty form
/// GET /api/v1/form
pub async fn get_form() -> Json<ApiResponse<FormDefinition>> {
    Json(ApiResponse::success(definition(&VistoriaForm::default())))
}

/// Wizard definition for the form as currently filled in
/// POST /api/v1/form
pub async fn resolve_form(Json(form): Json<VistoriaForm>) -> Json<ApiResponse<FormDefinition>> {
    Json(ApiResponse::success(definition(&form)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_lists_all_steps_and_options() {
        let def = definition(&VistoriaForm::default());
        assert_eq!(def.steps.len(), 6);
        assert_eq!(def.steps[3].title, "Situação da Obra");
        assert_eq!(def.objetivos.len(), 6);
        assert_eq!(def.situacoes[1].label, "Com Pendências");
    }

    #[test]
    fn test_details_field_follows_situation() {
        let form = VistoriaForm {
            situacao: Some(Situacao::IrregularidadesGraves),
            ..Default::default()
        };
        let def = definition(&form);
        assert!(def.steps[3].fields.contains(&"detalhes_pendencias"));
    }
}
