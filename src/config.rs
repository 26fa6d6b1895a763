use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, io::Read, path::{Path, PathBuf}};
use anyhow::{Context, Result, bail};

use crate::drivers::ProviderId;

pub const CONTENT_PLACEHOLDER: &str = "{content}";
pub const RATING_PLACEHOLDER: &str = "{rating}";

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_BAIDU_URL: &str = "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions";
const DEFAULT_BAIDU_MODEL: &str = "ernie-bot-turbo";
const DEFAULT_ALIBABA_URL: &str = "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";
const DEFAULT_ALIBABA_MODEL: &str = "qwen-turbo";
const DEFAULT_TENCENT_URL: &str = "https://hunyuan.tencentcloudapi.com/";
const DEFAULT_TENCENT_MODEL: &str = "hunyuan-lite";

const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f64 = 0.7;

const DEFAULT_SYSTEM_PROMPT: &str = "你是一名专业的教育评价专家，擅长为学生提供详细、建设性的课堂表现评价。";

const DEFAULT_TEMPLATE: &str = "作为一名专业的教育评价专家，请根据以下课堂内容和评价等级，生成一份具体、详细的学生课堂表现评价：

课堂内容：{content}
评价等级：{rating}

评价要求：
1. **必须紧密结合课程内容**：分析学生对本节课具体知识点的掌握情况
2. **具体化评价**：基于课堂中的具体表现、回答、互动等实际情况进行评价
3. **知识点导向**：明确指出学生在哪些知识点上表现良好，哪些需要加强
4. **实例支撑**：如果可能，引用学生在课堂中的具体表现作为评价依据

评价结构：
- 开头：简要总结学生在本节课的整体表现
- 主体：详细分析学生对具体知识点的掌握情况
  * 重点知识理解程度
  * 课堂互动参与情况
  * 问题回答质量
  * 学习态度表现
- 结尾：基于本节课内容给出具体的改进建议

语言要求：
- 专业且具体，避免空泛的套话
- 紧密结合课程内容，体现专业性
- 字数控制在250-350字之间
- 语调积极正面，鼓励学生进步

请直接输出评价内容，不要包含标题或格式标记。";

/// Rating labels with built-in guidance, paired with the variable that overrides each one.
const RATING_DEFAULTS: [(&str, &str, &str); 4] = [
    ("优秀", "EXCELLENT_PROMPT", "该学生在本节课表现优秀，请重点分析其对具体知识点的掌握情况，突出其在课堂中的优秀表现（如准确回答问题、积极参与讨论、创新思维等），并基于本节课内容给出进一步提升的具体建议。"),
    ("良好", "GOOD_PROMPT", "该学生在本节课表现良好，请分析其对课程知识点的掌握情况，平衡地评价其优点（如基本理解、适度参与等）和需要改进的地方，并基于本节课的具体内容给出针对性的改进建议。"),
    ("一般", "AVERAGE_PROMPT", "该学生在本节课表现一般，请具体分析其在课程知识点掌握上的不足之处，指出其在课堂互动、问题回答等方面的具体问题，并基于本节课内容给出具体的改进建议和鼓励。"),
    ("待改进", "POOR_PROMPT", "该学生在本节课需要改进，请温和地分析其在课程知识点理解上的具体问题，指出其在课堂参与、学习态度等方面的不足，并基于本节课内容给出详细的改进方案和鼓励。"),
];

/// Read-only settings shared by the evaluation core. Built once per process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderId,
    pub openai: Service,
    pub baidu: Service,
    pub alibaba: Service,
    pub tencent: Service,
    pub max_tokens: u32,
    pub temperature: f64,
    pub system_prompt: String,
    pub template: String,
    pub rating_prompts: HashMap<String, String>,
    pub evaluation: EvaluationLimits,
}

#[derive(Debug, Clone)]
pub struct Service {
    /// Base URL for the openai class, full endpoint for the others.
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationLimits {
    pub min_content_length: usize,
    pub max_content_length: usize,
    pub default_word_count: usize,
    pub enable_custom_rating: bool,
    /// Set when `min_content_length` was configured rather than defaulted.
    #[serde(skip)]
    pub min_length_enforced: bool,
}

impl Default for EvaluationLimits {
    fn default() -> Self {
        Self {
            min_content_length: 10,
            max_content_length: 500,
            default_word_count: 250,
            enable_custom_rating: false,
            min_length_enforced: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
struct PartialService {
    pub url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
}

impl PartialService {
    fn merge(mut self, other: PartialService) -> Self {
        if other.url.is_some() { self.url = other.url; }
        if other.model.is_some() { self.model = other.model; }
        if other.api_key.is_some() { self.api_key = other.api_key; }
        if other.secret_key.is_some() { self.secret_key = other.secret_key; }
        self
    }

    fn into_service(self, url: &str, model: &str) -> Service {
        Service {
            url: self.url.unwrap_or_else(|| url.to_string()),
            model: self.model.unwrap_or_else(|| model.to_string()),
            api_key: self.api_key.filter(|k| !k.is_empty()),
            secret_key: self.secret_key.filter(|k| !k.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
struct PartialServices {
    pub openai: Option<PartialService>,
    pub baidu: Option<PartialService>,
    pub alibaba: Option<PartialService>,
    pub tencent: Option<PartialService>,
}

fn merge_opt(a: Option<PartialService>, b: Option<PartialService>) -> Option<PartialService> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.merge(b)),
        (a, b) => b.or(a),
    }
}

impl PartialServices {
    fn merge(self, other: PartialServices) -> Self {
        Self {
            openai: merge_opt(self.openai, other.openai),
            baidu: merge_opt(self.baidu, other.baidu),
            alibaba: merge_opt(self.alibaba, other.alibaba),
            tencent: merge_opt(self.tencent, other.tencent),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
struct PartialEvaluation {
    pub min_content_length: Option<usize>,
    pub max_content_length: Option<usize>,
    pub default_word_count: Option<usize>,
    pub enable_custom_rating: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct PartialConfig {
    pub provider: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub system_prompt: Option<String>,
    pub template: Option<String>,
    pub rating_prompts: Option<HashMap<String, String>>,
    pub services: Option<PartialServices>,
    pub evaluation: Option<PartialEvaluation>,
}

impl PartialConfig {
    fn merge(mut self, other: PartialConfig) -> Self {
        if other.provider.is_some() { self.provider = other.provider; }
        if other.max_tokens.is_some() { self.max_tokens = other.max_tokens; }
        if other.temperature.is_some() { self.temperature = other.temperature; }
        if other.system_prompt.is_some() { self.system_prompt = other.system_prompt; }
        if other.template.is_some() { self.template = other.template; }

        if let Some(other_prompts) = other.rating_prompts {
             let mut current = self.rating_prompts.unwrap_or_default();
             current.extend(other_prompts);
             self.rating_prompts = Some(current);
        }

        if let Some(other_services) = other.services {
             let current = self.services.unwrap_or_default();
             self.services = Some(current.merge(other_services));
        }

        if let Some(other_eval) = other.evaluation {
             let mut current = self.evaluation.unwrap_or_default();
             if other_eval.min_content_length.is_some() { current.min_content_length = other_eval.min_content_length; }
             if other_eval.max_content_length.is_some() { current.max_content_length = other_eval.max_content_length; }
             if other_eval.default_word_count.is_some() { current.default_word_count = other_eval.default_word_count; }
             if other_eval.enable_custom_rating.is_some() { current.enable_custom_rating = other_eval.enable_custom_rating; }
             self.evaluation = Some(current);
        }

        self
    }

    /// Overrides taken from environment variables. Unparseable numbers are ignored.
    fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let service = |key: &str, secret: Option<&str>, model: Option<&str>, url: Option<&str>| {
            let partial = PartialService {
                url: url.and_then(|n| var(n)),
                model: model.and_then(|n| var(n)),
                api_key: var(key),
                secret_key: secret.and_then(|n| var(n)),
            };
            if partial.url.is_none() && partial.model.is_none() && partial.api_key.is_none() && partial.secret_key.is_none() {
                None
            } else {
                Some(partial)
            }
        };

        let mut rating_prompts = HashMap::new();
        for (label, name, _) in RATING_DEFAULTS {
            if let Some(text) = var(name) {
                rating_prompts.insert(label.to_string(), text);
            }
        }

        let evaluation = PartialEvaluation {
            min_content_length: var("MIN_CONTENT_LENGTH").and_then(|v| v.trim().parse().ok()),
            max_content_length: var("MAX_CONTENT_LENGTH").and_then(|v| v.trim().parse().ok()),
            default_word_count: var("DEFAULT_WORD_COUNT").and_then(|v| v.trim().parse().ok()),
            enable_custom_rating: var("ENABLE_CUSTOM_RATING").map(|v| v.trim() == "true"),
        };

        Self {
            provider: var("AI_PROVIDER"),
            max_tokens: var("OPENAI_MAX_TOKENS").and_then(|v| v.trim().parse().ok()),
            temperature: var("OPENAI_TEMPERATURE").and_then(|v| v.trim().parse().ok()),
            system_prompt: var("SYSTEM_PROMPT"),
            template: var("MAIN_PROMPT"),
            rating_prompts: if rating_prompts.is_empty() { None } else { Some(rating_prompts) },
            services: Some(PartialServices {
                openai: service("OPENAI_API_KEY", None, Some("OPENAI_MODEL"), Some("OPENAI_BASE_URL")),
                baidu: service("BAIDU_API_KEY", Some("BAIDU_SECRET_KEY"), None, None),
                alibaba: service("ALIBABA_API_KEY", None, None, None),
                tencent: service("TENCENT_API_KEY", None, None, None),
            }),
            evaluation: Some(evaluation),
        }
    }

    fn try_into_settings(self) -> Result<Settings> {
        let provider = match self.provider.as_deref() {
            Some(name) => name.trim().parse::<ProviderId>()
                .with_context(|| format!("Invalid 'provider' in configuration: {}", name))?,
            None => ProviderId::OpenAi,
        };

        let max_tokens = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            bail!("'max_tokens' must be a positive integer");
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            bail!("'temperature' must be between 0 and 2, got {}", temperature);
        }

        let template = self.template.unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        for placeholder in [CONTENT_PLACEHOLDER, RATING_PLACEHOLDER] {
            if !template.contains(placeholder) {
                bail!("Prompt template is missing the {} placeholder", placeholder);
            }
        }

        let mut rating_prompts: HashMap<String, String> = RATING_DEFAULTS
            .iter()
            .map(|(label, _, text)| (label.to_string(), text.to_string()))
            .collect();
        rating_prompts.extend(self.rating_prompts.unwrap_or_default());

        let services = self.services.unwrap_or_default();
        let defaults = EvaluationLimits::default();
        let eval = self.evaluation.unwrap_or_default();

        Ok(Settings {
            provider,
            openai: services.openai.unwrap_or_default().into_service(DEFAULT_OPENAI_URL, DEFAULT_OPENAI_MODEL),
            baidu: services.baidu.unwrap_or_default().into_service(DEFAULT_BAIDU_URL, DEFAULT_BAIDU_MODEL),
            alibaba: services.alibaba.unwrap_or_default().into_service(DEFAULT_ALIBABA_URL, DEFAULT_ALIBABA_MODEL),
            tencent: services.tencent.unwrap_or_default().into_service(DEFAULT_TENCENT_URL, DEFAULT_TENCENT_MODEL),
            max_tokens,
            temperature,
            system_prompt: self.system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            template,
            rating_prompts,
            evaluation: EvaluationLimits {
                min_content_length: eval.min_content_length.unwrap_or(defaults.min_content_length),
                max_content_length: eval.max_content_length.unwrap_or(defaults.max_content_length),
                default_word_count: eval.default_word_count.unwrap_or(defaults.default_word_count),
                enable_custom_rating: eval.enable_custom_rating.unwrap_or(defaults.enable_custom_rating),
                min_length_enforced: eval.min_content_length.is_some(),
            },
        })
    }
}

impl Settings {
    /// Loads global and local configuration files, then applies the process environment.
    pub fn load(explicit_path: Option<String>) -> Result<Self> {
        let mut final_partial = PartialConfig::default();

        // 1. Global config
        if let Some(global_path) = Self::get_global_config_path() {
            if global_path.exists() {
                 match Self::load_partial(&global_path) {
                     Ok(partial) => {
                         final_partial = final_partial.merge(partial);
                         tracing::debug!(path = %global_path.display(), "loaded global config");
                     },
                     Err(e) => tracing::warn!(path = %global_path.display(), error = %e, "ignoring unreadable global config"),
                 }
            }
        }

        // 2. Local config: explicit path, ./pingyu.yml, then <config_dir>/pingyu.yml
        let local_path = match explicit_path {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                let cwd_config = PathBuf::from("pingyu.yml");
                if cwd_config.exists() {
                    Some(cwd_config)
                } else {
                    dirs::config_dir()
                        .map(|dir| dir.join("pingyu.yml"))
                        .filter(|p| p.exists())
                }
            }
        };

        if let Some(path) = local_path {
             let partial = Self::load_partial(&path).context(format!("Failed to load config at {:?}", path))?;
             final_partial = final_partial.merge(partial);
             tracing::debug!(path = %path.display(), "loaded local config");
        }

        // 3. Environment
        final_partial
            .merge(PartialConfig::from_env(|name| std::env::var(name).ok()))
            .try_into_settings()
    }

    /// Builds settings from a YAML document and an environment lookup.
    #[cfg(test)]
    pub fn from_sources<F>(yaml: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let partial: PartialConfig = if yaml.trim().is_empty() {
            PartialConfig::default()
        } else {
            serde_yaml::from_str(yaml).context("Failed to parse configuration")?
        };
        partial.merge(PartialConfig::from_env(lookup)).try_into_settings()
    }

    #[cfg(test)]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_sources(yaml, |_| None)
    }

    pub fn service(&self, id: ProviderId) -> &Service {
        match id {
            ProviderId::OpenAi => &self.openai,
            ProviderId::Baidu => &self.baidu,
            ProviderId::Alibaba => &self.alibaba,
            ProviderId::Tencent => &self.tencent,
        }
    }

    /// Guidance for a rating label; empty entries count as absent.
    pub fn guidance(&self, rating: &str) -> Option<&str> {
        self.rating_prompts
            .get(rating)
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }

    #[inline]
    fn get_global_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("ProgramData").ok().map(|pd| PathBuf::from(pd).join("pingyu").join("pingyu.yml"))
        }

        #[cfg(target_os = "macos")]
        {
             Some(PathBuf::from("/Library/Application Support/pingyu/pingyu.yml"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Some(PathBuf::from("/etc/pingyu.yml"))
        }
    }

    fn load_partial(path: &Path) -> Result<PartialConfig> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(PartialConfig::default());
        }
        let partial: PartialConfig = serde_yaml::from_str(&contents)?;
        Ok(partial)
    }
}
