//! Six-step inspection wizard: step order, titles and which fields each
//! step shows for the current state of the form.

use serde::Serialize;

use crate::models::VistoriaForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Objetivos,
    Identificacao,
    Descricao,
    Situacao,
    RegistroFotografico,
    Assinaturas,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Objetivos,
        Step::Identificacao,
        Step::Descricao,
        Step::Situacao,
        Step::RegistroFotografico,
        Step::Assinaturas,
    ];

    /// 1-based position in the wizard
    pub fn number(&self) -> u8 {
        Step::ALL
            .iter()
            .position(|s| s == self)
            .map(|i| i as u8 + 1)
            .unwrap_or(1)
    }

    pub fn from_number(number: u8) -> Option<Step> {
        number
            .checked_sub(1)
            .and_then(|i| Step::ALL.get(i as usize))
            .copied()
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Objetivos => "Objetivos da Vistoria",
            Step::Identificacao => "Identificação da Obra",
            Step::Descricao => "Descrição das Atividades",
            Step::Situacao => "Situação da Obra",
            Step::RegistroFotografico => "Registro Fotográfico",
            Step::Assinaturas => "Assinaturas",
        }
    }

    pub fn next(self) -> Step {
        Step::from_number(self.number() + 1).unwrap_or(self)
    }

    pub fn prev(self) -> Step {
        Step::from_number(self.number() - 1).unwrap_or(self)
    }

    /// Fields rendered as editable on this step
    pub fn fields(&self, form: &VistoriaForm) -> Vec<&'static str> {
        match self {
            Step::Objetivos => vec!["objetivos", "outro_objetivo"],
            Step::Identificacao => vec![
                "nome_obra",
                "localizacao",
                "numero_contrato",
                "empresa_responsavel",
                "engenheiro_responsavel",
                "fiscal_prefeitura",
                "data_vistoria",
                "hora_vistoria",
            ],
            Step::Descricao => vec!["descricao_atividades"],
            Step::Situacao => {
                let mut fields = vec!["situacao"];
                if form.situacao.is_some_and(|s| s.shows_details()) {
                    fields.push("detalhes_pendencias");
                }
                fields.push("recomendacoes");
                fields
            }
            Step::RegistroFotografico => vec!["fotos"],
            Step::Assinaturas => vec![
                "fiscal_nome",
                "fiscal_matricula",
                "representante_nome",
                "representante_cargo",
            ],
        }
    }

    pub fn is_last(&self) -> bool {
        *self == Step::Assinaturas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Situacao;

    #[test]
    fn test_navigation_clamps() {
        assert_eq!(Step::Objetivos.prev(), Step::Objetivos);
        assert_eq!(Step::Objetivos.next(), Step::Identificacao);
        assert_eq!(Step::Assinaturas.next(), Step::Assinaturas);
        assert_eq!(Step::from_number(5), Some(Step::RegistroFotografico));
        assert_eq!(Step::from_number(0), None);
        assert_eq!(Step::from_number(7), None);
        assert!(Step::Assinaturas.is_last());
    }

    #[test]
    fn test_titles_follow_order() {
        let titles: Vec<_> = Step::ALL.iter().map(|s| s.title()).collect();
        assert_eq!(titles[0], "Objetivos da Vistoria");
        assert_eq!(titles[5], "Assinaturas");
        assert_eq!(Step::Situacao.number(), 4);
    }

    #[test]
    fn test_details_editable_only_for_pending_situations() {
        for situacao in Situacao::ALL {
            let form = VistoriaForm {
                situacao: Some(situacao),
                ..Default::default()
            };
            let shown = Step::Situacao.fields(&form).contains(&"detalhes_pendencias");
            let expected = matches!(
                situacao,
                Situacao::ComPendencias | Situacao::IrregularidadesGraves
            );
            assert_eq!(shown, expected, "{:?}", situacao);
        }

        let empty = VistoriaForm::default();
        assert!(!Step::Situacao.fields(&empty).contains(&"detalhes_pendencias"));
    }
}
