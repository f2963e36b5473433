use crate::utils::error::FashionError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;

/// Fashion-MNIST类别标签，顺序与模型输出下标一一对应
pub const FASHION_MNIST_LABELS: [&str; 10] = [
    "T-shirt/top",
    "Trouser",
    "Pullover",
    "Dress",
    "Coat",
    "Sandal",
    "Shirt",
    "Sneaker",
    "Bag",
    "Ankle boot",
];

/// 有序类别标签集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn fashion_mnist() -> Self {
        Self::new(FASHION_MNIST_LABELS)
    }

    /// 解析标签文件内容，每行一个标签，忽略空行
    pub fn parse(content: &str) -> Result<Self> {
        let labels: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            return Err(FashionError::Config("Label file contains no labels".to_string()));
        }

        Ok(Self(labels))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| FashionError::ModelLoad(format!("Failed to read labels: {}", e)))?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::fashion_mnist()
    }
}

/// 单个类别的置信度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: String,
    pub score: f32,
}

/// 按标签顺序排列的类别置信度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassScores(Vec<ClassScore>);

impl ClassScores {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[ClassScore] {
        &self.0
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.0.iter().find(|entry| entry.label == label).map(|entry| entry.score)
    }

    /// 按置信度降序排列，同分保持标签顺序，NaN排在最后
    pub fn ranked(&self) -> Vec<ClassScore> {
        let mut ranked = self.0.clone();
        ranked.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
        });
        ranked
    }
}

impl FromIterator<(String, f32)> for ClassScores {
    fn from_iter<T: IntoIterator<Item = (String, f32)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(label, score)| ClassScore { label, score })
                .collect(),
        )
    }
}

impl fmt::Display for ClassScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", entry.label, ResultFormatter::format_score(entry.score))?;
        }
        write!(f, "}}")
    }
}

/// 最高置信度的预测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub score: f32,
}

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 模型输出下标 i 对应标签列表第 i 项
    pub fn to_class_scores(vector: &[f32], labels: &LabelSet) -> Result<ClassScores> {
        if vector.len() != labels.len() {
            return Err(FashionError::ShapeMismatch {
                expected: labels.len(),
                actual: vector.len(),
            });
        }

        Ok(labels
            .iter()
            .zip(vector)
            .map(|(label, &score)| (label.to_string(), score))
            .collect())
    }

    /// 选出最高分类别；同分取下标最小者，NaN不参与比较
    pub fn top_prediction(scores: &ClassScores) -> Result<Prediction> {
        let mut best: Option<(usize, &ClassScore)> = None;

        for (index, entry) in scores.entries().iter().enumerate() {
            let replace = match best {
                None => true,
                Some((_, current)) => {
                    entry.score > current.score || (current.score.is_nan() && !entry.score.is_nan())
                }
            };
            if replace {
                best = Some((index, entry));
            }
        }

        let (index, entry) = best.ok_or(FashionError::EmptyScores)?;
        Ok(Prediction {
            index,
            label: entry.label.clone(),
            score: entry.score,
        })
    }

    /// 显示文本：首行为预测标签，次行为完整置信度映射
    pub fn format_display(prediction: &Prediction, scores: &ClassScores) -> String {
        format!("{}\n{}", prediction.label, scores)
    }

    /// 分数文本：总带小数部分，数量级在 [1e-3, 1e7) 之外时使用 `E` 指数记法
    pub fn format_score(value: f32) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        if value.is_infinite() {
            return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }
        if value == 0.0 {
            return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
        }

        let sign = if value < 0.0 { "-" } else { "" };
        // `{:e}` 给出可往返的最短有效数字
        let scientific = format!("{:e}", value.abs());
        let (mantissa, exponent) = scientific
            .split_once('e')
            .unwrap_or((scientific.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

        if (-3..7).contains(&exponent) {
            let body = if exponent < 0 {
                format!("0.{}{}", "0".repeat((-exponent - 1) as usize), digits)
            } else {
                let point = exponent as usize + 1;
                if digits.len() > point {
                    format!("{}.{}", &digits[..point], &digits[point..])
                } else {
                    format!("{}{}.0", digits, "0".repeat(point - digits.len()))
                }
            };
            format!("{}{}", sign, body)
        } else {
            let (lead, rest) = digits.split_at(1);
            let fraction = if rest.is_empty() { "0" } else { rest };
            format!("{}{}.{}E{}", sign, lead, fraction, exponent)
        }
    }

    /// 取前 k 个类别
    pub fn top_k(scores: &ClassScores, k: usize) -> Vec<ClassScore> {
        let mut ranked = scores.ranked();
        ranked.truncate(k);
        ranked
    }
}
