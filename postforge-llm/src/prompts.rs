//! System instructions and message assembly for each post operation.

use postforge_utils::has_text;

use crate::{GeneratorError, Operation};

pub const BUSINESS_NAME_INSTRUCTION: &str = "You are an AI assistant specialised in text analysis. \
The user will provide information about a business. Your only task is to extract the name of the \
business from that text. Reply with the business name only, without quotes or any additional text. \
If you are not sure, reply with 'unknown business'.";

pub const REFINE_PREMISE_INSTRUCTION: &str = "You are an AI assistant specialised in writing prompts. \
The user will give you a simple idea for a social-media post. Expand that idea into a detailed, clear \
prompt that can serve as the basis for generating a high-quality post title and post body.";

pub const TITLE_INSTRUCTION: &str = "You are a social-media marketing expert. Write a title for a \
Facebook post based on the business information and the topic provided. Reply with a single short \
title of fewer than 60 characters.";

pub const CONTENT_INSTRUCTION: &str = "You are a social-media marketing expert. Based on the business \
information and the title provided, write the complete body of an engaging Facebook post that grabs \
the reader's attention. End with a call to action.";

pub const IMAGE_PROMPT_INSTRUCTION: &str = "You are a social-media marketing expert and a visual \
artist. Based on the title and content of the post, write a detailed and vivid description of the \
image that best represents the post. The description must be suited to an AI image generator. \
Include details about style, lighting and composition.";

const BUSINESS_INFO_LABEL: &str = " Business information: ";

/// One system/user exchange sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub operation: Operation,
    pub system: String,
    pub user: String,
}

pub fn extract_business_name(profile: &str) -> Result<ChatPrompt, GeneratorError> {
    let operation = Operation::ExtractBusinessName;
    require(operation, profile)?;
    Ok(ChatPrompt {
        operation,
        system: BUSINESS_NAME_INSTRUCTION.to_string(),
        user: profile.to_string(),
    })
}

pub fn refine_premise(premise: &str) -> Result<ChatPrompt, GeneratorError> {
    let operation = Operation::RefinePremise;
    require(operation, premise)?;
    Ok(ChatPrompt {
        operation,
        system: REFINE_PREMISE_INSTRUCTION.to_string(),
        user: premise.to_string(),
    })
}

pub fn generate_title(profile: &str, premise: &str) -> Result<ChatPrompt, GeneratorError> {
    let operation = Operation::GenerateTitle;
    require(operation, profile)?;
    require(operation, premise)?;
    Ok(ChatPrompt {
        operation,
        system: with_business_info(TITLE_INSTRUCTION, profile),
        user: premise.to_string(),
    })
}

pub fn generate_content(profile: &str, title: &str) -> Result<ChatPrompt, GeneratorError> {
    let operation = Operation::GenerateContent;
    require(operation, profile)?;
    require(operation, title)?;
    Ok(ChatPrompt {
        operation,
        system: with_business_info(CONTENT_INSTRUCTION, profile),
        user: format!("Write the post content. The title is: {title}"),
    })
}

pub fn generate_image_prompt(
    profile: &str,
    title: &str,
    content: &str,
) -> Result<ChatPrompt, GeneratorError> {
    let operation = Operation::GenerateImagePrompt;
    require(operation, profile)?;
    require(operation, title)?;
    require(operation, content)?;
    Ok(ChatPrompt {
        operation,
        system: with_business_info(IMAGE_PROMPT_INSTRUCTION, profile),
        user: format!("Write an image description. Title: {title}\nContent: {content}"),
    })
}

fn with_business_info(instruction: &str, profile: &str) -> String {
    format!("{instruction}{BUSINESS_INFO_LABEL}{profile}")
}

fn require(operation: Operation, input: &str) -> Result<(), GeneratorError> {
    if has_text(input) {
        Ok(())
    } else {
        Err(GeneratorError::EmptyInput { operation })
    }
}
