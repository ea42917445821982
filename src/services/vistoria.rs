use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    AutocompleteData, CreatedVistoria, Objetivo, Situacao, Vistoria, VistoriaByContract,
    VistoriaDetails, VistoriaFoto, VistoriaForm, VistoriaListItem, VistoriaStats,
};
use crate::validation;

/// Status given to every record saved from the wizard
pub const STATUS_FINALIZADO: &str = "finalizado";

fn optional(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub struct VistoriaService;

impl VistoriaService {
    /// Validate and insert a new record owned by `user_id`
    pub async fn create(db: &Database, user_id: &str, form: VistoriaForm) -> Result<CreatedVistoria> {
        let form = validation::validate(form)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let situacao = form.situacao;
        let is = |s: Situacao| situacao == Some(s);

        sqlx::query(
            r#"
            INSERT INTO obra_vistorias (
                id, user_id, nome_obra, localizacao, numero_contrato, empresa_responsavel,
                engenheiro_responsavel, fiscal_prefeitura, data_vistoria, hora_vistoria,
                latitude, longitude,
                objetivo_atualizacao_cadastral, objetivo_inicio_obra, objetivo_vistoria_rotina,
                objetivo_medicao, objetivo_vistoria_tecnica, objetivo_encerramento, objetivo_outros,
                descricao_atividades,
                situacao_conformidade, situacao_pendencias, situacao_irregularidades,
                situacao_paralisada, situacao_finalizada,
                detalhes_pendencias, recomendacoes,
                fiscal_nome, fiscal_matricula, representante_nome, representante_cargo,
                status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&form.nome_obra)
        .bind(&form.localizacao)
        .bind(optional(&form.numero_contrato))
        .bind(optional(&form.empresa_responsavel))
        .bind(optional(&form.engenheiro_responsavel))
        .bind(optional(&form.fiscal_prefeitura))
        .bind(&form.data_vistoria)
        .bind(&form.hora_vistoria)
        .bind(form.latitude)
        .bind(form.longitude)
        .bind(form.has_objetivo(Objetivo::AtualizacaoCadastral))
        .bind(form.has_objetivo(Objetivo::InicioObra))
        .bind(form.has_objetivo(Objetivo::VistoriaRotina))
        .bind(form.has_objetivo(Objetivo::Medicao))
        .bind(form.has_objetivo(Objetivo::VistoriaTecnica))
        .bind(form.has_objetivo(Objetivo::Encerramento))
        .bind(optional(&form.outro_objetivo))
        .bind(&form.descricao_atividades)
        .bind(is(Situacao::EmConformidade))
        .bind(is(Situacao::ComPendencias))
        .bind(is(Situacao::IrregularidadesGraves))
        .bind(is(Situacao::Paralisada))
        .bind(is(Situacao::Finalizada))
        .bind(optional(&form.detalhes_pendencias))
        .bind(optional(&form.recomendacoes))
        .bind(optional(&form.fiscal_nome))
        .bind(optional(&form.fiscal_matricula))
        .bind(optional(&form.representante_nome))
        .bind(optional(&form.representante_cargo))
        .bind(STATUS_FINALIZADO)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await?;

        tracing::info!("Vistoria {} created by {}", id, user_id);
        Ok(CreatedVistoria { id })
    }

    /// Newest first
    pub async fn list(db: &Database, user_id: &str) -> Result<Vec<VistoriaListItem>> {
        let rows: Vec<Vistoria> = sqlx::query_as(
            "SELECT * FROM obra_vistorias WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;

        Ok(rows.into_iter().map(VistoriaListItem::from).collect())
    }

    pub async fn get(db: &Database, user_id: &str, id: &str) -> Result<Vistoria> {
        sqlx::query_as("SELECT * FROM obra_vistorias WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Vistoria not found".to_string()))
    }

    /// Record plus its photos ordered by `ordem`
    pub async fn details(db: &Database, user_id: &str, id: &str) -> Result<VistoriaDetails> {
        let vistoria = Self::get(db, user_id, id).await?;

        let fotos: Vec<VistoriaFoto> = sqlx::query_as(
            "SELECT * FROM vistoria_fotos WHERE vistoria_id = ? ORDER BY ordem ASC, created_at ASC",
        )
        .bind(id)
        .fetch_all(db.pool())
        .await?;

        Ok(VistoriaDetails::new(vistoria, fotos))
    }

    pub async fn stats(db: &Database, user_id: &str) -> Result<VistoriaStats> {
        let rows: Vec<Vistoria> = sqlx::query_as("SELECT * FROM obra_vistorias WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(db.pool())
            .await?;

        let mut stats = VistoriaStats::default();
        for row in &rows {
            stats.record(row.situacao());
        }
        Ok(stats)
    }

    /// Distinct non-empty values from the user's records, most recent first
    pub async fn autocomplete(db: &Database, user_id: &str) -> Result<AutocompleteData> {
        let rows: Vec<Vistoria> = sqlx::query_as(
            "SELECT * FROM obra_vistorias WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;

        fn push(values: &mut Vec<String>, value: Option<&str>) {
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                if !values.iter().any(|v| v == value) {
                    values.push(value.to_string());
                }
            }
        }

        let mut data = AutocompleteData::default();
        for row in &rows {
            push(&mut data.nomes_obra, Some(&row.nome_obra));
            push(&mut data.numeros_contrato, row.numero_contrato.as_deref());
            push(&mut data.empresas_responsavel, row.empresa_responsavel.as_deref());
            push(&mut data.engenheiros_responsavel, row.engenheiro_responsavel.as_deref());
            push(&mut data.representantes_nome, row.representante_nome.as_deref());
            push(&mut data.representantes_cargo, row.representante_cargo.as_deref());
            push(&mut data.outros_objetivos, row.objetivo_outros.as_deref());
        }
        Ok(data)
    }

    /// Identification of the latest record for a contract number
    pub async fn by_contract(
        db: &Database,
        user_id: &str,
        numero_contrato: &str,
    ) -> Result<Option<VistoriaByContract>> {
        let numero_contrato = numero_contrato.trim();
        if numero_contrato.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query_as(
            r#"
            SELECT nome_obra, empresa_responsavel, engenheiro_responsavel
            FROM obra_vistorias
            WHERE user_id = ? AND numero_contrato = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(numero_contrato)
        .fetch_optional(db.pool())
        .await?;

        Ok(row)
    }
}
