use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::models::VistoriaFoto;

/// Why an inspection was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objetivo {
    AtualizacaoCadastral,
    InicioObra,
    VistoriaRotina,
    Medicao,
    VistoriaTecnica,
    Encerramento,
}

impl Objetivo {
    /// Display order of the checkbox list
    pub const ALL: [Objetivo; 6] = [
        Objetivo::AtualizacaoCadastral,
        Objetivo::InicioObra,
        Objetivo::VistoriaRotina,
        Objetivo::Medicao,
        Objetivo::VistoriaTecnica,
        Objetivo::Encerramento,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Objetivo::AtualizacaoCadastral => "Atualização Cadastral",
            Objetivo::InicioObra => "Início de Obra",
            Objetivo::VistoriaRotina => "Vistoria de Rotina",
            Objetivo::Medicao => "Medição",
            Objetivo::VistoriaTecnica => "Vistoria Técnica/Análise de Conformidade",
            Objetivo::Encerramento => "Encerramento/Entrega da Obra",
        }
    }
}

/// Inspector's overall assessment of the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Situacao {
    EmConformidade,
    ComPendencias,
    IrregularidadesGraves,
    Paralisada,
    Finalizada,
}

impl Situacao {
    pub const ALL: [Situacao; 5] = [
        Situacao::EmConformidade,
        Situacao::ComPendencias,
        Situacao::IrregularidadesGraves,
        Situacao::Paralisada,
        Situacao::Finalizada,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Situacao::EmConformidade => "Em Conformidade",
            Situacao::ComPendencias => "Com Pendências",
            Situacao::IrregularidadesGraves => "Irregularidades Graves",
            Situacao::Paralisada => "Paralisada",
            Situacao::Finalizada => "Finalizada",
        }
    }

    /// Whether the issue-details field is shown for this situation
    pub fn shows_details(&self) -> bool {
        matches!(self, Situacao::ComPendencias | Situacao::IrregularidadesGraves)
    }
}

/// GPS fix attached to a record or photo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Inspection form as submitted by the wizard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VistoriaForm {
    // Identificação da obra
    pub nome_obra: String,
    pub localizacao: String,
    pub numero_contrato: String,
    pub empresa_responsavel: String,
    pub engenheiro_responsavel: String,
    pub fiscal_prefeitura: String,
    pub data_vistoria: String,
    pub hora_vistoria: String,

    // Objetivos
    pub objetivos: Vec<Objetivo>,
    pub outro_objetivo: String,

    pub descricao_atividades: String,

    // Situação
    pub situacao: Option<Situacao>,
    pub detalhes_pendencias: String,

    pub recomendacoes: String,

    // Assinaturas
    pub fiscal_nome: String,
    pub fiscal_matricula: String,
    pub representante_nome: String,
    pub representante_cargo: String,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl VistoriaForm {
    pub fn has_objetivo(&self, objetivo: Objetivo) -> bool {
        self.objetivos.contains(&objetivo)
    }

    /// Atualização Cadastral relaxes every required field except the objectives
    pub fn is_atualizacao_cadastral(&self) -> bool {
        self.has_objetivo(Objetivo::AtualizacaoCadastral)
    }

    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }

    /// Fill the inspector fields from the signed-in user's profile
    pub fn prefill_inspector(&mut self, full_name: &str) {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return;
        }
        if self.fiscal_prefeitura.trim().is_empty() {
            self.fiscal_prefeitura = full_name.to_string();
        }
        if self.fiscal_nome.trim().is_empty() {
            self.fiscal_nome = full_name.to_string();
        }
    }

    /// Record the GPS fix; an empty location is filled with the coordinates
    pub fn apply_location(&mut self, point: GeoPoint) {
        self.latitude = Some(point.latitude);
        self.longitude = Some(point.longitude);
        if self.localizacao.trim().is_empty() {
            self.localizacao = point.to_string();
        }
    }
}

/// Persisted inspection record (table `obra_vistorias`)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Vistoria {
    pub id: String,
    pub user_id: Option<String>,
    pub nome_obra: String,
    pub localizacao: String,
    pub numero_contrato: Option<String>,
    pub empresa_responsavel: Option<String>,
    pub engenheiro_responsavel: Option<String>,
    pub fiscal_prefeitura: Option<String>,
    pub data_vistoria: String,
    pub hora_vistoria: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub objetivo_atualizacao_cadastral: bool,
    pub objetivo_inicio_obra: bool,
    pub objetivo_vistoria_rotina: bool,
    pub objetivo_medicao: bool,
    pub objetivo_vistoria_tecnica: bool,
    pub objetivo_encerramento: bool,
    pub objetivo_outros: Option<String>,
    pub descricao_atividades: String,
    pub situacao_conformidade: bool,
    pub situacao_pendencias: bool,
    pub situacao_irregularidades: bool,
    pub situacao_paralisada: bool,
    pub situacao_finalizada: bool,
    pub detalhes_pendencias: Option<String>,
    pub recomendacoes: Option<String>,
    pub fiscal_nome: Option<String>,
    pub fiscal_matricula: Option<String>,
    pub representante_nome: Option<String>,
    pub representante_cargo: Option<String>,
    pub status: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Vistoria {
    pub fn objetivos(&self) -> Vec<Objetivo> {
        let flags = [
            self.objetivo_atualizacao_cadastral,
            self.objetivo_inicio_obra,
            self.objetivo_vistoria_rotina,
            self.objetivo_medicao,
            self.objetivo_vistoria_tecnica,
            self.objetivo_encerramento,
        ];
        Objetivo::ALL
            .into_iter()
            .zip(flags)
            .filter_map(|(objetivo, set)| set.then_some(objetivo))
            .collect()
    }

    /// Situation flag, resolved finalizada > conformidade > irregularidades > pendências > paralisada
    pub fn situacao(&self) -> Option<Situacao> {
        if self.situacao_finalizada {
            Some(Situacao::Finalizada)
        } else if self.situacao_conformidade {
            Some(Situacao::EmConformidade)
        } else if self.situacao_irregularidades {
            Some(Situacao::IrregularidadesGraves)
        } else if self.situacao_pendencias {
            Some(Situacao::ComPendencias)
        } else if self.situacao_paralisada {
            Some(Situacao::Paralisada)
        } else {
            None
        }
    }

    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        }
    }
}

/// Row of the inspection list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VistoriaListItem {
    pub id: String,
    pub nome_obra: String,
    pub localizacao: String,
    pub data_vistoria: String,
    pub status: Option<String>,
    pub created_at: String,
    pub empresa_responsavel: Option<String>,
    pub engenheiro_responsavel: Option<String>,
    pub numero_contrato: Option<String>,
    pub situacao: Option<Situacao>,
}

impl From<Vistoria> for VistoriaListItem {
    fn from(v: Vistoria) -> Self {
        let situacao = v.situacao();
        Self {
            id: v.id,
            nome_obra: v.nome_obra,
            localizacao: v.localizacao,
            data_vistoria: v.data_vistoria,
            status: v.status,
            created_at: v.created_at,
            empresa_responsavel: v.empresa_responsavel,
            engenheiro_responsavel: v.engenheiro_responsavel,
            numero_contrato: v.numero_contrato,
            situacao,
        }
    }
}

/// Full record with its photos ordered by `ordem`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VistoriaDetails {
    #[serde(flatten)]
    pub vistoria: Vistoria,
    pub objetivos: Vec<Objetivo>,
    pub situacao: Option<Situacao>,
    pub fotos: Vec<VistoriaFoto>,
}

impl VistoriaDetails {
    pub fn new(vistoria: Vistoria, fotos: Vec<VistoriaFoto>) -> Self {
        Self {
            objetivos: vistoria.objetivos(),
            situacao: vistoria.situacao(),
            vistoria,
            fotos,
        }
    }
}

/// Per-user counters shown on the list page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VistoriaStats {
    pub total: i64,
    pub finalizado: i64,
    pub em_conformidade: i64,
    pub irregularidades: i64,
    pub pendencias: i64,
    pub paralisada: i64,
}

impl VistoriaStats {
    pub fn record(&mut self, situacao: Option<Situacao>) {
        self.total += 1;
        match situacao {
            Some(Situacao::Finalizada) => self.finalizado += 1,
            Some(Situacao::EmConformidade) => self.em_conformidade += 1,
            Some(Situacao::IrregularidadesGraves) => self.irregularidades += 1,
            Some(Situacao::ComPendencias) => self.pendencias += 1,
            Some(Situacao::Paralisada) => self.paralisada += 1,
            None => {}
        }
    }
}

/// Suggestions for the autocomplete inputs, distinct values from the user's own records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteData {
    pub nomes_obra: Vec<String>,
    pub numeros_contrato: Vec<String>,
    pub empresas_responsavel: Vec<String>,
    pub engenheiros_responsavel: Vec<String>,
    pub representantes_nome: Vec<String>,
    pub representantes_cargo: Vec<String>,
    pub outros_objetivos: Vec<String>,
}

/// Fields copied into the form when a known contract number is picked
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VistoriaByContract {
    pub nome_obra: String,
    pub empresa_responsavel: Option<String>,
    pub engenheiro_responsavel: Option<String>,
}

/// Identifier returned after a record is created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedVistoria {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_deserializes_with_missing_fields() {
        let form: VistoriaForm = serde_json::from_str(
            r#"{"nome_obra": "Escola", "objetivos": ["medicao", "inicio_obra"], "situacao": "com_pendencias"}"#,
        )
        .unwrap();

        assert_eq!(form.nome_obra, "Escola");
        assert_eq!(form.objetivos, vec![Objetivo::Medicao, Objetivo::InicioObra]);
        assert_eq!(form.situacao, Some(Situacao::ComPendencias));
        assert!(form.localizacao.is_empty());
        assert!(form.latitude.is_none());
    }

    #[test]
    fn test_prefill_keeps_existing_values() {
        let mut form = VistoriaForm {
            fiscal_nome: "Maria".to_string(),
            ..Default::default()
        };
        form.prefill_inspector("  João Silva ");
        assert_eq!(form.fiscal_prefeitura, "João Silva");
        assert_eq!(form.fiscal_nome, "Maria");
    }

    #[test]
    fn test_apply_location_formats_six_decimals() {
        let mut form = VistoriaForm::default();
        form.apply_location(GeoPoint {
            latitude: -27.0451234567,
            longitude: -49.6234,
        });
        assert_eq!(form.localizacao, "-27.045123, -49.623400");
        assert_eq!(form.position().map(|p| p.latitude), Some(-27.0451234567));

        let mut named = VistoriaForm {
            localizacao: "Rua XV".to_string(),
            ..Default::default()
        };
        named.apply_location(GeoPoint {
            latitude: 1.0,
            longitude: 2.0,
        });
        assert_eq!(named.localizacao, "Rua XV");
    }

    #[test]
    fn test_stats_buckets() {
        let mut stats = VistoriaStats::default();
        stats.record(Some(Situacao::Finalizada));
        stats.record(Some(Situacao::ComPendencias));
        stats.record(Some(Situacao::ComPendencias));
        stats.record(None);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.finalizado, 1);
        assert_eq!(stats.pendencias, 2);
        assert_eq!(stats.em_conformidade, 0);
    }
}
