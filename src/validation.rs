//! Form validation for inspection submissions.
//!
//! Runs on both sides: the field client rejects a form before any network
//! call, and the server checks again before inserting.

use serde::Serialize;
use std::fmt;

use crate::models::{Objetivo, VistoriaForm};

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// All problems found in one form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &'static str) {
        self.errors.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

const REQUIRED: [(&str, &str); 12] = [
    ("nome_obra", "Nome da obra é obrigatório"),
    ("localizacao", "Localização é obrigatória"),
    ("numero_contrato", "Número do contrato é obrigatório"),
    ("empresa_responsavel", "Empresa responsável é obrigatória"),
    ("engenheiro_responsavel", "Engenheiro responsável é obrigatório"),
    ("fiscal_prefeitura", "Fiscal da prefeitura é obrigatório"),
    ("data_vistoria", "Data da vistoria é obrigatória"),
    ("hora_vistoria", "Hora da vistoria é obrigatória"),
    ("descricao_atividades", "Descrição das atividades é obrigatória"),
    ("fiscal_nome", "Nome do fiscal é obrigatório"),
    ("representante_nome", "Nome do representante é obrigatório"),
    ("representante_cargo", "Cargo do representante é obrigatório"),
];

fn text_field<'a>(form: &'a VistoriaForm, field: &str) -> &'a str {
    match field {
        "nome_obra" => &form.nome_obra,
        "localizacao" => &form.localizacao,
        "numero_contrato" => &form.numero_contrato,
        "empresa_responsavel" => &form.empresa_responsavel,
        "engenheiro_responsavel" => &form.engenheiro_responsavel,
        "fiscal_prefeitura" => &form.fiscal_prefeitura,
        "data_vistoria" => &form.data_vistoria,
        "hora_vistoria" => &form.hora_vistoria,
        "descricao_atividades" => &form.descricao_atividades,
        "fiscal_nome" => &form.fiscal_nome,
        "representante_nome" => &form.representante_nome,
        "representante_cargo" => &form.representante_cargo,
        _ => "",
    }
}

/// Trim every text field, drop hidden details and apply the
/// Atualização Cadastral default name.
pub fn normalize(mut form: VistoriaForm) -> VistoriaForm {
    for value in [
        &mut form.nome_obra,
        &mut form.localizacao,
        &mut form.numero_contrato,
        &mut form.empresa_responsavel,
        &mut form.engenheiro_responsavel,
        &mut form.fiscal_prefeitura,
        &mut form.data_vistoria,
        &mut form.hora_vistoria,
        &mut form.outro_objetivo,
        &mut form.descricao_atividades,
        &mut form.detalhes_pendencias,
        &mut form.recomendacoes,
        &mut form.fiscal_nome,
        &mut form.fiscal_matricula,
        &mut form.representante_nome,
        &mut form.representante_cargo,
    ] {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }

    let mut seen = Vec::with_capacity(form.objetivos.len());
    form.objetivos.retain(|o| {
        if seen.contains(o) {
            false
        } else {
            seen.push(*o);
            true
        }
    });

    if !form.situacao.is_some_and(|s| s.shows_details()) {
        form.detalhes_pendencias.clear();
    }

    if form.is_atualizacao_cadastral() && form.nome_obra.is_empty() {
        form.nome_obra = Objetivo::AtualizacaoCadastral.label().to_string();
    }

    form
}

/// Normalize and validate a submitted form
pub fn validate(form: VistoriaForm) -> Result<VistoriaForm, ValidationErrors> {
    let form = normalize(form);
    let mut errors = ValidationErrors::default();

    if form.objetivos.is_empty() {
        errors.push("objetivos", "Selecione pelo menos um objetivo");
    }

    if !form.is_atualizacao_cadastral() {
        for (field, message) in REQUIRED {
            if text_field(&form, field).is_empty() {
                errors.push(field, message);
            }
        }

        // Details stay optional even for pending situations
        if form.situacao.is_none() {
            errors.push("situacao", "Situação da obra é obrigatória");
        }
    }

    if form.latitude.is_some() != form.longitude.is_some() {
        errors.push("latitude", "Coordenadas GPS incompletas");
    }

    if errors.is_empty() {
        Ok(form)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
pub(crate) fn complete_form() -> VistoriaForm {
    use crate::models::Situacao;

    VistoriaForm {
        nome_obra: "Creche Municipal Bairro Centro".to_string(),
        localizacao: "Rua das Flores, 120".to_string(),
        numero_contrato: "CT-042/2024".to_string(),
        empresa_responsavel: "Construtora Vale Ltda".to_string(),
        engenheiro_responsavel: "Eng. Carla Souza".to_string(),
        fiscal_prefeitura: "Pedro Ramos".to_string(),
        data_vistoria: "2024-05-14".to_string(),
        hora_vistoria: "09:30".to_string(),
        objetivos: vec![Objetivo::VistoriaRotina],
        outro_objetivo: String::new(),
        descricao_atividades: "Concretagem da laje do bloco B".to_string(),
        situacao: Some(Situacao::EmConformidade),
        detalhes_pendencias: String::new(),
        recomendacoes: "Manter cronograma".to_string(),
        fiscal_nome: "Pedro Ramos".to_string(),
        fiscal_matricula: "4521".to_string(),
        representante_nome: "Luiz Alves".to_string(),
        representante_cargo: "Mestre de obras".to_string(),
        latitude: Some(-27.05),
        longitude: Some(-49.62),
    }
}
